//! Example: Send one action to a cover and print its status.
//!
//! ```text
//! cargo run --example send_command -- --host 192.168.0.50 --mac 34:ea:34:b4:3a:0f \
//!     --code JgBQAAABKJMUEhQ3FBIUEhQSFBIU --action open
//! ```

use broadlink_cover::{CoverAction, CoverDefinition, Transceiver, TransceiverConfig, parse_mac};
use clap::Parser;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    host: String,
    #[arg(long)]
    mac: String,
    /// Base64-encoded RF/IR code to send for the chosen action
    #[arg(long)]
    code: String,
    /// open, close or stop
    #[arg(long, default_value = "open")]
    action: CoverAction,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = TransceiverConfig::builder()
        .host(&args.host)
        .mac(parse_mac(&args.mac)?)
        .build();

    let code = Some(args.code.as_str());
    let (open, close, stop) = match args.action {
        CoverAction::Open => (code, None, None),
        CoverAction::Close => (None, code, None),
        CoverAction::Stop => (None, None, code),
    };
    let cover = CoverDefinition::from_encoded("demo", None, open, close, stop, None)?;

    println!("Connecting to transceiver...");
    let transceiver = Transceiver::connect(config, vec![cover]).await;
    println!("Session valid: {}", transceiver.session().is_valid());

    let delivered = transceiver.execute("demo", args.action).await?;
    println!("{} delivered: {delivered}", args.action);

    for (slug, status) in transceiver.statuses().await {
        println!(
            "  {slug:10} state={} is_closed={:?} available={} features={:#x}",
            status.state,
            status.is_closed,
            status.available,
            status.features.bits()
        );
    }

    Ok(())
}
