/// Core types for the zenoh-duel library
use serde::Serialize;

use crate::error::{DuelError, Result};
use crate::name_generator;

/// Unique member identifier
///
/// MemberId must be a valid single-chunk keyexpr:
/// - Non-empty UTF-8 string
/// - Cannot contain: / * $ ? # @
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MemberId(String);

impl MemberId {
    /// Generate a new member ID with a human-readable name and numeric suffix
    pub fn generate() -> Self {
        MemberId(name_generator::generate_unique_name())
    }

    /// Create from a specific name (must be unique and keyexpr-compatible)
    pub fn from_name(name: String) -> Result<Self> {
        validate_chunk(&name).map_err(DuelError::InvalidMemberId)?;
        Ok(MemberId(name))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a shared session scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new session ID (guaranteed to be keyexpr-safe)
    /// Uses base58 encoding of UUID to avoid special characters
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let encoded = bs58::encode(uuid.as_bytes()).into_string();
        SessionId(encoded.chars().take(16).collect())
    }

    /// Parse a session ID received out of band (command line, invite)
    pub fn parse(s: &str) -> Result<Self> {
        validate_chunk(s).map_err(DuelError::InvalidSessionId)?;
        Ok(SessionId(s.to_string()))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_chunk(s: &str) -> std::result::Result<(), String> {
    if s.is_empty() {
        return Err("identifier cannot be empty".to_string());
    }
    if let Some(ch) = s
        .chars()
        .find(|ch| matches!(ch, '/' | '*' | '$' | '?' | '#' | '@'))
    {
        return Err(format!("'{}' contains invalid character '{}'", s, ch));
    }
    Ok(())
}

/// Playable side. The host and the guest always hold opposite roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Rabbit,
    Mole,
}

impl Role {
    /// The complementary role
    pub fn other(self) -> Self {
        match self {
            Role::Rabbit => Role::Mole,
            Role::Mole => Role::Rabbit,
        }
    }

    /// Store token for this role
    pub fn token(self) -> &'static str {
        match self {
            Role::Rabbit => "Rabbit",
            Role::Mole => "Mole",
        }
    }

    /// Parse a store token, `None` for anything unrecognised
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Rabbit" => Some(Role::Rabbit),
            "Mole" => Some(Role::Mole),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Result of a finished game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Winner {
    #[default]
    None,
    Rabbit,
    Mole,
    Both,
}

impl Winner {
    /// Store token for this result
    pub fn token(self) -> &'static str {
        match self {
            Winner::None => "None",
            Winner::Rabbit => "Rabbit",
            Winner::Mole => "Mole",
            Winner::Both => "Both",
        }
    }

    /// Parse a store token; unknown tokens read as `Winner::None`
    pub fn from_token(token: &str) -> Self {
        match token {
            "Rabbit" => Winner::Rabbit,
            "Mole" => Winner::Mole,
            "Both" => Winner::Both,
            _ => Winner::None,
        }
    }

    /// Whether the given role is among the winners
    pub fn includes(self, role: Role) -> bool {
        matches!(
            (self, role),
            (Winner::Both, _) | (Winner::Rabbit, Role::Rabbit) | (Winner::Mole, Role::Mole)
        )
    }
}

impl From<Role> for Winner {
    fn from(role: Role) -> Self {
        match role {
            Role::Rabbit => Winner::Rabbit,
            Role::Mole => Winner::Mole,
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Snapshot of one session member, as shown in the lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    /// Member identifier
    pub id: MemberId,
    /// Self-reported display name (empty if not yet replicated)
    pub name: String,
    /// Role derived from the role table
    pub role: Role,
    /// Ready vote stamped with the current role table version
    pub ready: bool,
    /// Whether this member owns the session
    pub is_host: bool,
}

/// What the host asked every peer to load for one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartRequest {
    /// StartNonce of the round
    pub start_nonce: u64,
    /// Map to load
    pub map_id: u64,
    /// Day parameter for the map
    pub day: u64,
}

/// Why a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// The other peer left the session mid-game
    Forfeit,
    /// The host published the result
    Published,
    /// The other peer never completed the load barrier
    LoadTimeout,
}

/// Final outcome applied to the local game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameOutcome {
    pub winner: Winner,
    pub reason: EndReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_generation() {
        let id1 = MemberId::generate();
        let id2 = MemberId::generate();

        assert!(!id1.as_str().is_empty());
        // Generated names are keyexpr-safe
        assert!(MemberId::from_name(id2.as_str().to_string()).is_ok());
    }

    #[test]
    fn test_member_id_invalid_characters() {
        assert!(MemberId::from_name("has/slash".to_string()).is_err());
        assert!(MemberId::from_name("has*star".to_string()).is_err());
        assert!(MemberId::from_name("has$dollar".to_string()).is_err());
        assert!(MemberId::from_name("has?question".to_string()).is_err());
        assert!(MemberId::from_name("has#hash".to_string()).is_err());
        assert!(MemberId::from_name("has@at".to_string()).is_err());
        assert!(MemberId::from_name("".to_string()).is_err());
    }

    #[test]
    fn test_session_id_generation() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), 16);
        assert_ne!(id, SessionId::generate());
        assert_eq!(SessionId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_role_tokens() {
        assert_eq!(Role::Rabbit.other(), Role::Mole);
        assert_eq!(Role::Mole.other(), Role::Rabbit);
        assert_eq!(Role::from_token("Mole"), Some(Role::Mole));
        assert_eq!(Role::from_token("mole"), None);
    }

    #[test]
    fn test_winner_tokens() {
        assert_eq!(Winner::from_token("Both"), Winner::Both);
        assert_eq!(Winner::from_token("garbage"), Winner::None);
        assert_eq!(Winner::from(Role::Rabbit), Winner::Rabbit);
        assert!(Winner::Both.includes(Role::Mole));
        assert!(!Winner::Rabbit.includes(Role::Mole));
        assert!(!Winner::None.includes(Role::Rabbit));
    }

    #[test]
    fn test_player_info_json() {
        let player = PlayerInfo {
            id: MemberId::from_name("Pipkin_7".to_string()).unwrap(),
            name: "Pipkin".to_string(),
            role: Role::Mole,
            ready: true,
            is_host: false,
        };
        let json = serde_json::to_value(&player).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "Pipkin_7",
                "name": "Pipkin",
                "role": "Mole",
                "ready": true,
                "is_host": false
            })
        );
    }
}
