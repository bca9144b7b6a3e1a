//! Console command parsing and rendering

use std::fmt::Write as _;

use parley_core::clock::{format_datetime, format_hms};
use parley_core::kick_vote::VoteStatus;
use parley_core::time_correction::TimeStatus;
use parley_core::{HistoryEntry, NodeEvent, NodeStatus, Peer, PeerId};

pub const HELP: &str = "\
Commands:
  history          show the chat history
  peers            list participants
  time             show synchronized and local time
  kick <name>      start a vote to evict <name> (coordinator only)
  vote <yes|no>    vote in the running kick vote
  resync           ask the coordinator for peers and history
  status           show this node's state
  leave            leave the chat
  help             show this help
Anything else is sent as a chat message.";

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    History,
    Peers,
    Time,
    Kick(String),
    Vote(bool),
    Resync,
    Status,
    Leave,
    Help,
    Chat(String),
    /// A known command with bad arguments; carries the usage line
    Usage(&'static str),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match (head.to_lowercase().as_str(), rest) {
            ("history", "") => Command::History,
            ("peers", "") => Command::Peers,
            ("time", "") => Command::Time,
            ("resync", "") => Command::Resync,
            ("status", "") => Command::Status,
            ("leave", "") => Command::Leave,
            ("help", "") => Command::Help,
            ("kick", "") => Command::Usage("kick <name>"),
            ("kick", name) => Command::Kick(name.to_string()),
            ("vote", ballot) => match parse_ballot(ballot) {
                Some(vote) => Command::Vote(vote),
                None => Command::Usage("vote <yes|no>"),
            },
            _ => Command::Chat(line.to_string()),
        }
    }
}

fn parse_ballot(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

pub fn render_entry(entry: &HistoryEntry) -> String {
    format!(
        "[{}] {}: {}",
        format_hms(entry.corrected_time),
        entry.origin_name,
        entry.text
    )
}

pub fn render_history(entries: &[HistoryEntry]) -> String {
    let mut out = String::from("--- history ---\n");
    for entry in entries {
        let _ = writeln!(out, "{}", render_entry(entry));
    }
    out.push_str("--- end of history ---");
    out
}

pub fn render_peers(peers: &[Peer], me: Option<PeerId>, coordinator: Option<PeerId>) -> String {
    let mut out = String::from("--- participants ---\n");
    for peer in peers {
        let mut tags = Vec::new();
        if Some(peer.id) == me {
            tags.push("you");
        }
        if Some(peer.id) == coordinator {
            tags.push("coordinator");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" ({})", tags.join(", "))
        };
        let _ = writeln!(out, "  {:>3} {} {}{}", peer.id, peer.name, peer.address, tags);
    }
    out.push_str("--- end of list ---");
    out
}

pub fn render_time(status: &TimeStatus) -> String {
    let mut out = format!(
        "synchronized time: {}\ncorrection:        {:+.2}s\nlocal time:        {}",
        format_hms(status.corrected),
        status.offset,
        format_hms(status.wall)
    );
    match status.last_sync {
        Some(at) => {
            let _ = write!(out, "\nlast sync:         {}", format_datetime(at));
        }
        None => out.push_str("\nlast sync:         never"),
    }
    out
}

pub fn render_vote(vote: &VoteStatus) -> String {
    format!(
        "kick vote against {} by {}: {} yes, {} no, {}s left",
        vote.target_name,
        vote.initiator_name,
        vote.favor_count,
        vote.against_count,
        vote.remaining.as_secs()
    )
}

pub fn render_status(status: &NodeStatus) -> String {
    let id = status
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let coordinator = status
        .coordinator
        .as_ref()
        .map(|c| format!("{} ({}) at {}", c.name, c.id, c.address))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "node {} [{}] at {}\nrole: {}\ncoordinator: {}\npeers: {}, history: {}, lamport: {}\nclock offset: {:+.3}s\nevicted ids: {:?}",
        status.name,
        id,
        status.address,
        status.role,
        coordinator,
        status.peer_count,
        status.history_len,
        status.lamport,
        status.clock_offset,
        status.banned
    )
}

/// Console line for an event, if it is worth showing
pub fn render_event(event: &NodeEvent) -> Option<String> {
    let line = match event {
        NodeEvent::Joined { id, coordinator: true } => {
            format!("* joined as {} and became coordinator", id)
        }
        NodeEvent::Joined { id, .. } => format!("* joined with id {}", id),
        NodeEvent::ChatReceived(entry) => render_entry(entry),
        NodeEvent::PeerJoined(peer) => format!("* {} joined", peer.name),
        NodeEvent::PeerLeft { id, name } => match name {
            Some(name) => format!("* {} left", name),
            None => format!("* peer {} left", id),
        },
        NodeEvent::CoordinatorChanged { is_self: true, .. } => {
            "* you are now the coordinator".to_string()
        }
        NodeEvent::CoordinatorChanged { id, name, .. } => {
            format!("* new coordinator: {} ({})", name, id)
        }
        NodeEvent::ElectionStarted => "* election started".to_string(),
        NodeEvent::VoteStarted {
            target_name,
            initiator_name,
            duration,
            ..
        } => format!(
            "* {} started a vote to kick {} ({}s). Use 'vote yes' or 'vote no'",
            initiator_name,
            target_name,
            duration.as_secs()
        ),
        NodeEvent::BallotCast { voter_name, vote } => format!(
            "* {} voted {}",
            voter_name,
            if *vote { "yes" } else { "no" }
        ),
        NodeEvent::VoteResolved {
            target_name,
            evicted,
            favor_count,
            against_count,
            ..
        } => format!(
            "* {} {} ({} yes, {} no)",
            target_name,
            if *evicted { "was kicked" } else { "stays" },
            favor_count,
            against_count
        ),
        NodeEvent::ClockAdjusted { .. } | NodeEvent::HistorySynced { .. } => return None,
        NodeEvent::Evicted => "* you were voted out of the chat".to_string(),
    };
    Some(line)
}
