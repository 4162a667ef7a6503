//! Audio adapter: reports the cues the engine requests
//!
//! Sound synthesis is not implemented; cues are logged so cartridge authors
//! can follow what would play.

use zest_engine::cartridge::Cue;
use zest_engine::AudioEngine;

#[derive(Debug, Default)]
pub struct LoggingAudio {
    /// Looping song, so re-entering a room with the same song stays quiet
    current_song: Option<String>,
    tempo: Option<f64>,
}

impl AudioEngine for LoggingAudio {
    fn play_sound(&mut self, sound: &Cue) {
        tracing::info!("♪ sound '{}'", sound.name);
    }

    fn loop_music(&mut self, song: &Cue) {
        if self.current_song.as_deref() == Some(song.name.as_str()) {
            return;
        }
        tracing::info!("♪ loop song '{}'", song.name);
        self.current_song = Some(song.name.clone());
    }

    fn play_once_music(&mut self, song: &Cue) {
        tracing::info!("♪ play song '{}' once", song.name);
        self.current_song = None;
    }

    fn stop_music(&mut self) {
        if let Some(song) = self.current_song.take() {
            tracing::info!("♪ stop '{}'", song);
        }
    }

    fn set_tempo(&mut self, bpm: f64) {
        if self.tempo != Some(bpm) {
            tracing::debug!("♪ tempo {} bpm", bpm);
            self.tempo = Some(bpm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as Json;

    fn cue(name: &str) -> Cue {
        Cue {
            name: name.to_string(),
            data: Json::Null,
        }
    }

    #[test]
    fn tracks_looping_song() {
        let mut audio = LoggingAudio::default();
        audio.loop_music(&cue("theme"));
        assert_eq!(audio.current_song.as_deref(), Some("theme"));
        audio.stop_music();
        assert_eq!(audio.current_song, None);
        audio.set_tempo(140.0);
        assert_eq!(audio.tempo, Some(140.0));
    }
}
