//! Typed messages between the host client and the tracker core.
//!
//! Host adapters translate native client callbacks into [`HostEvent`]s and
//! push them through an [`EventSender`] from any thread. The periodic game
//! tick itself is not an event: the host calls the session's `tick`, which
//! drains the [`EventQueue`] first and answers with [`HostAction`]s the
//! host carries out (redraw, chat, dialogs, clipboard). Actions can be
//! written as JSON lines through an [`ActionSink`].

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::mpsc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::TaskType;

pub const ACTION_SCHEMA_VERSION: &str = "tasks-tracker.action.v1";

/// Client connection states as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Unknown,
    Starting,
    LoginScreen,
    LoginScreenAuthenticator,
    LoggingIn,
    Loading,
    LoggedIn,
    ConnectionLost,
    Hopping,
}

impl GameState {
    pub fn is_logged_in(self) -> bool {
        matches!(
            self,
            GameState::LoggedIn | GameState::Hopping | GameState::Loading
        )
    }

    pub fn is_logged_out(self) -> bool {
        matches!(
            self,
            GameState::LoginScreen | GameState::LoginScreenAuthenticator
        )
    }
}

/// Game mode profile; each one keeps separate saved data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileType {
    #[default]
    Standard,
    Beta,
    QuestSpeedRunning,
    Deadman,
    PvpArena,
    TrailblazerLeague,
    DeadmanReborn,
    ShatteredRelicsLeague,
}

impl ProfileType {
    pub fn key(self) -> &'static str {
        match self {
            ProfileType::Standard => "standard",
            ProfileType::Beta => "beta",
            ProfileType::QuestSpeedRunning => "quest_speed_running",
            ProfileType::Deadman => "deadman",
            ProfileType::PvpArena => "pvp_arena",
            ProfileType::TrailblazerLeague => "trailblazer_league",
            ProfileType::DeadmanReborn => "deadman_reborn",
            ProfileType::ShatteredRelicsLeague => "shattered_relics_league",
        }
    }

    pub const ALL: [ProfileType; 8] = [
        ProfileType::Standard,
        ProfileType::Beta,
        ProfileType::QuestSpeedRunning,
        ProfileType::Deadman,
        ProfileType::PvpArena,
        ProfileType::TrailblazerLeague,
        ProfileType::DeadmanReborn,
        ProfileType::ShatteredRelicsLeague,
    ];
}

impl FromStr for ProfileType {
    type Err = Error;

    /// Accepts the snake_case key in any case, with `-` or `_`.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        ProfileType::ALL
            .into_iter()
            .find(|profile| profile.key() == wanted)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown profile type: {s}")))
    }
}

/// Live varp values, read from the client at decode time.
pub trait VarpSource {
    fn varp_value(&self, varp_id: u32) -> i32;
}

impl VarpSource for HashMap<u32, i32> {
    fn varp_value(&self, varp_id: u32) -> i32 {
        self.get(&varp_id).copied().unwrap_or(0)
    }
}

impl VarpSource for BTreeMap<u32, i32> {
    fn varp_value(&self, varp_id: u32) -> i32 {
        self.get(&varp_id).copied().unwrap_or(0)
    }
}

/// Notifications consumed by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    VarpChanged {
        varp_id: u32,
    },
    GameStateChanged {
        state: GameState,
        #[serde(default)]
        profile: ProfileType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
    },
    ConfigChanged {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    ChatMessage {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshScope {
    All,
    Task { task_type: TaskType, id: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    Information,
    Warning,
    Error,
}

/// Requests the host carries out on behalf of the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostAction {
    Refresh {
        scope: RefreshScope,
    },
    SetLoggedIn {
        logged_in: bool,
    },
    SendChatMessage {
        message: String,
    },
    ShowDialog {
        title: String,
        message: String,
        kind: DialogKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        link: Option<String>,
    },
    CopyToClipboard {
        text: String,
    },
}

impl HostAction {
    pub fn refresh_all() -> Self {
        HostAction::Refresh {
            scope: RefreshScope::All,
        }
    }

    pub fn dialog(title: impl Into<String>, message: impl Into<String>, kind: DialogKind) -> Self {
        HostAction::ShowDialog {
            title: title.into(),
            message: message.into(),
            kind,
            link: None,
        }
    }
}

/// Receiving end, owned by the session's tick path.
pub struct EventQueue {
    sender: mpsc::Sender<HostEvent>,
    receiver: mpsc::Receiver<HostEvent>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> EventSender {
        EventSender(self.sender.clone())
    }

    /// Everything queued so far, in arrival order.
    pub fn drain(&self) -> Vec<HostEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Cloneable, thread-safe handle for host adapters.
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::Sender<HostEvent>);

impl EventSender {
    /// Returns false once the session has been dropped.
    pub fn send(&self, event: HostEvent) -> bool {
        self.0.send(event).is_ok()
    }
}

#[derive(Debug, Clone, Serialize)]
struct ActionRecord<'a> {
    schema_version: &'static str,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    action: &'a HostAction,
}

/// Writes host actions as JSON lines.
pub struct ActionSink {
    writer: Box<dyn Write + Send>,
}

impl ActionSink {
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Append to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }

    pub fn emit(&mut self, action: &HostAction) -> Result<()> {
        let record = ActionRecord {
            schema_version: ACTION_SCHEMA_VERSION,
            timestamp: Utc::now(),
            action,
        };
        let serialized = serde_json::to_vec(&record)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }

    pub fn emit_all(&mut self, actions: &[HostAction]) -> Result<()> {
        for action in actions {
            self.emit(action)?;
        }
        Ok(())
    }
}
