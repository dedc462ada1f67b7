use clap::Parser;

#[derive(Parser)]
#[command(name = "stomp")]
#[command(version)]
#[command(about = "Interactive STOMP client over WebSocket")]
pub struct Cli {
    /// Broker WebSocket endpoint
    #[arg(short, long, default_value = "ws://127.0.0.1:15674/ws")]
    pub url: String,

    /// Login username
    #[arg(short, long, default_value = "guest")]
    pub login: String,

    /// Passcode
    #[arg(short, long, default_value = "guest")]
    pub passcode: String,

    /// Virtual host sent in the CONNECT `host` header
    #[arg(long)]
    pub vhost: Option<String>,

    /// Seconds between transport pings (0 disables them)
    #[arg(long, default_value_t = 10)]
    pub heartbeat: u64,

    /// Seconds between reconnect attempts after the connection drops (0 disables them)
    #[arg(long)]
    pub reconnect: Option<u64>,

    /// Destinations to subscribe to (can be specified multiple times)
    #[arg(short, long)]
    pub subscribe: Vec<String>,

    /// Show session summary on exit
    #[arg(long)]
    pub summary: bool,
}
