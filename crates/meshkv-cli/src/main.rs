//! Demo command-line interface for `meshkv` (§6.5: "None at the
//! library layer. A debug switch toggles verbose tracing at
//! runtime."). Not part of the library's public contract; just a
//! convenient way to exercise `Set`/`Get`/`NetStart` from a shell.

use clap::{Parser, Subcommand};
use meshkv::MeshStore;
use std::io::{self, BufRead, Write};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meshkv-cli", about = "Exercise a meshkv store from the shell")]
struct Cli {
    /// Verbose tracing (debug-level spans for the store and worker).
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs a short scripted demo against a local, non-replicated store.
    Demo,
    /// Opens an interactive `int -> int` store, optionally replicated
    /// over multicast, and reads `set`/`get`/`del`/`count`/`quit` lines
    /// from stdin.
    Serve {
        /// Multicast port to join; 0 (the default) disables replication.
        #[arg(long, default_value_t = 0)]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();
    let filter_handle = init_tracing(cli.debug);

    match cli.command {
        Command::Demo => run_demo(),
        Command::Serve { port } => run_serve(port, filter_handle),
    }
}

/// Handle returned by [`init_tracing`] for flipping the filter at
/// runtime (§6.5's "a debug switch toggles verbose tracing at
/// runtime"), rather than only at startup.
type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn init_tracing(debug: bool) -> FilterHandle {
    let default_filter = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}

/// Swaps the active `EnvFilter` for `"debug"` or `"info"`. Errors only
/// if the subscriber the handle points at has already been dropped,
/// which can't happen here since `main` holds the process open.
fn set_verbose(handle: &FilterHandle, verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    if let Err(e) = handle.reload(EnvFilter::new(level)) {
        eprintln!("failed to change log level: {e}");
    }
}

fn run_demo() {
    let store: MeshStore<i32, i32> = MeshStore::new("demo");
    for (k, v) in [(1, 1), (2, 10), (2, 2), (3, 3)] {
        store.set(k, v);
    }
    println!("count = {}", store.count());
    println!("get(2) = {:?}", store.get(&2));
    println!("del(3) = {}", store.del(&3));
    println!("count = {}", store.count());
}

fn run_serve(port: u16, filter_handle: FilterHandle) {
    let store: MeshStore<i32, i32> = MeshStore::new("serve");
    if port != 0 {
        match store.net_start(port) {
            Ok(()) => println!("replicating on multicast port {port}"),
            Err(e) => {
                eprintln!("failed to start replication: {e}");
                return;
            }
        }
    }

    println!("commands: set K V | get K | del K | count | debug on|off | quit");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["set", k, v] => match (k.parse::<i32>(), v.parse::<i32>()) {
                (Ok(k), Ok(v)) => println!("{}", store.set(k, v)),
                _ => println!("usage: set <int> <int>"),
            },
            ["get", k] => match k.parse::<i32>() {
                Ok(k) => println!("{:?}", store.get(&k)),
                Err(_) => println!("usage: get <int>"),
            },
            ["del", k] => match k.parse::<i32>() {
                Ok(k) => println!("{}", store.del(&k)),
                Err(_) => println!("usage: del <int>"),
            },
            ["count"] => println!("{}", store.count()),
            ["debug", "on"] => set_verbose(&filter_handle, true),
            ["debug", "off"] => set_verbose(&filter_handle, false),
            ["quit"] => break,
            _ => println!("unrecognised command"),
        }
        let _ = io::stdout().flush();
    }

    store.close();
}
