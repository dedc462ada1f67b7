use chrono::{DateTime, Local};
use std::collections::{BTreeMap, VecDeque};

/// How many received messages the report keeps.
pub const MAX_MESSAGES: usize = 1000;

/// One received message as shown in the report.
#[derive(Debug, Clone)]
pub struct LoggedMessage {
    pub received_at: DateTime<Local>,
    pub destination: String,
    pub body: String,
}

/// What happened during one CLI session.
pub struct SessionLog {
    pub started_at: DateTime<Local>,
    pub url: String,
    pub user: String,

    /// destination -> messages received
    pub subscriptions: BTreeMap<String, u64>,
    pub pings_sent: u64,
    pub receipts: u64,
    pub errors: u64,
    /// CONNECTED frames seen, including reconnects
    pub sessions: u64,

    pub messages: VecDeque<LoggedMessage>,
}

impl SessionLog {
    pub fn new(url: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            started_at: Local::now(),
            url: url.into(),
            user: user.into(),
            subscriptions: BTreeMap::new(),
            pings_sent: 0,
            receipts: 0,
            errors: 0,
            sessions: 0,
            messages: VecDeque::with_capacity(64),
        }
    }

    pub fn register_subscription(&mut self, destination: &str) {
        self.subscriptions.entry(destination.to_string()).or_default();
    }

    pub fn forget_subscription(&mut self, destination: &str) {
        self.subscriptions.remove(destination);
    }

    pub fn record_message(&mut self, destination: &str, body: String) {
        *self.subscriptions.entry(destination.to_string()).or_default() += 1;
        self.messages.push_back(LoggedMessage {
            received_at: Local::now(),
            destination: destination.to_string(),
            body,
        });
        while self.messages.len() > MAX_MESSAGES {
            self.messages.pop_front();
        }
    }

    pub fn total_messages(&self) -> u64 {
        self.subscriptions.values().sum()
    }

    pub fn summary(&self) -> String {
        self.report(false, 80)
    }

    /// Session report, optionally with the retained message history.
    pub fn report(&self, include_messages: bool, max_width: usize) -> String {
        let ended_at = Local::now();
        let elapsed = ended_at.signed_duration_since(self.started_at).num_seconds();
        let rule = "=".repeat(max_width);

        let mut lines = vec![
            rule.clone(),
            "  STOMP session report".to_string(),
            rule.clone(),
            format!("  Endpoint:   {}", self.url),
            format!("  User:       {}", self.user),
            format!("  Started:    {}", self.started_at.format("%Y-%m-%d %H:%M:%S")),
            format!("  Ended:      {}", ended_at.format("%Y-%m-%d %H:%M:%S")),
            format!("  Duration:   {}m {}s", elapsed / 60, elapsed % 60),
            format!("  Sessions:   {}", self.sessions),
            String::new(),
            "  Subscriptions:".to_string(),
        ];

        let width = self
            .subscriptions
            .keys()
            .map(|d| d.chars().count())
            .max()
            .unwrap_or(20)
            .clamp(5, 40);
        for (destination, count) in &self.subscriptions {
            lines.push(format!("    {:width$} {:>6}", truncate(destination, width), count));
        }
        lines.push(format!("    {}", "-".repeat(width + 7)));
        lines.push(format!("    {:width$} {:>6}", "Total", self.total_messages()));
        lines.push(String::new());
        lines.push(format!("  Pings sent: {}", self.pings_sent));
        lines.push(format!("  Receipts:   {}", self.receipts));
        lines.push(format!("  Errors:     {}", self.errors));

        if include_messages && !self.messages.is_empty() {
            lines.push(String::new());
            lines.push("  Message history".to_string());
            for msg in &self.messages {
                let prefix = format!("  {} [{}] ", msg.received_at.format("%H:%M:%S"), msg.destination);
                let room = max_width.saturating_sub(prefix.chars().count());
                lines.push(format!("{}{}", prefix, truncate(&msg.body.replace('\n', " "), room)));
            }
        }

        lines.push(rule);
        lines.join("\n")
    }
}

/// Cut `s` to at most `max` characters, marking the cut with "...".
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return ".".repeat(max);
    }
    let kept: String = s.chars().take(max - 3).collect();
    format!("{}...", kept)
}
