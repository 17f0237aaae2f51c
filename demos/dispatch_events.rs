//! Producer-side demo: bind events to handlers and spool a few emissions.
//!
//! Run a worker against the same root to drain them:
//!
//! ```text
//! cargo run --example dispatch_events -- --root /tmp/spool
//! cargo run -- start -m emails --root /tmp/spool -D
//! ```

use clap::Parser;
use serde_json::json;

use spoolq::dispatch::Dispatcher;
use spoolq::spool::QueueRegistry;

#[derive(Parser, Debug)]
#[command(name = "dispatch-events")]
#[command(about = "Spool a batch of demo events through the dispatcher")]
struct Args {
    /// Spool root directory
    #[arg(long, default_value = "/tmp/spool")]
    root: String,

    /// How many signup events to emit
    #[arg(short, long, default_value_t = 3)]
    count: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut dispatcher = Dispatcher::new(QueueRegistry::new(args.root.as_str()));
    dispatcher.connect("user_signed_up", "command", Some("emails"));
    dispatcher.connect("user_signed_up", "command", Some("audit"));

    for n in 0..args.count {
        let written = dispatcher.emit(
            "user_signed_up",
            &json!({
                "program": "echo",
                "args": [format!("welcome user {}", n)],
            }),
        )?;
        for name in written {
            println!("spooled {}", name);
        }
    }

    println!(
        "done; run `spoolq start -m emails --root {}` to drain",
        args.root
    );
    Ok(())
}
