//! Playlist generation
//!
//! Track selection is a pluggable strategy. The default [`MoodPoolSelector`]
//! is a fixed lookup keyed by mood; genres and activity are recorded on the
//! playlist but take no part in selection.

use chrono::{DateTime, Utc};
use moodtune_core::{Mood, Playlist, Track};
use uuid::Uuid;

use crate::validation::PlaylistRequest;

pub const MAX_TRACKS: usize = 10;

const PLACEHOLDER_ALBUM: &str = "Demo Album";
const PLACEHOLDER_IMAGE: &str = "/placeholder.svg?height=300&width=300";

/// Chooses tracks for a validated playlist request
pub trait TrackSelector: Send + Sync {
    fn select(&self, request: &PlaylistRequest) -> Vec<Track>;
}

/// Static track pools keyed by mood
#[derive(Debug, Clone)]
pub struct MoodPoolSelector {
    happy: Vec<Track>,
    energetic: Vec<Track>,
    calm: Vec<Track>,
}

fn track(id: &str, name: &str, artist: &str, duration: u32) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artist: artist.to_string(),
        album: PLACEHOLDER_ALBUM.to_string(),
        duration,
        image_url: PLACEHOLDER_IMAGE.to_string(),
    }
}

impl Default for MoodPoolSelector {
    fn default() -> Self {
        Self {
            happy: vec![
                track("1", "Happy Song", "Demo Artist 1", 210),
                track("2", "Sunshine Vibes", "Demo Artist 2", 195),
            ],
            energetic: vec![
                track("3", "Energy Boost", "Demo Artist 3", 180),
                track("4", "Power Up", "Demo Artist 4", 220),
            ],
            calm: vec![
                track("5", "Peaceful Mind", "Demo Artist 5", 240),
                track("6", "Serenity", "Demo Artist 6", 200),
            ],
        }
    }
}

impl MoodPoolSelector {
    fn pool(&self, mood: Mood) -> &[Track] {
        match mood {
            Mood::Energetic => &self.energetic,
            Mood::Calm => &self.calm,
            // No dedicated pool; fall back to happy
            _ => &self.happy,
        }
    }
}

impl TrackSelector for MoodPoolSelector {
    fn select(&self, request: &PlaylistRequest) -> Vec<Track> {
        self.pool(request.mood).iter().take(MAX_TRACKS).cloned().collect()
    }
}

/// Assemble a new playlist owned by `owner`, keeping at most [`MAX_TRACKS`]
pub fn build_playlist(request: PlaylistRequest, owner: Uuid, mut tracks: Vec<Track>, now: DateTime<Utc>) -> Playlist {
    tracks.truncate(MAX_TRACKS);
    let description = request
        .description
        .unwrap_or_else(|| format!("A {} playlist for {}", request.mood, request.activity));

    Playlist {
        id: Uuid::new_v4(),
        name: request.name,
        description,
        owner_id: owner,
        mood: request.mood,
        activity: request.activity,
        genres: request.genres,
        tracks,
        is_public: false,
        ai_generated: true,
        created_at: now,
        updated_at: now,
    }
}
