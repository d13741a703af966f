use crate::prelude::*;
use crate::audio::NodeGraph;
use crate::audio::util::{Pitch, midi_note_to_frequency};
use crate::sound::emit::Emitter;
use crate::sound::recipe::{SoundRecipe, Choice, raw_level, choice};
use crate::sound::recipes::tone::{voice, ONE_SHOT_LEVEL};

use anyhow::Context;


pub const GOVERNING: &str = "volume";
pub const CHOICES: &[Choice] = &[
	("instrument", &["sine", "organ", "bell", "pluck", "flute", "brass"]),
];

pub fn defaults() -> Table {
	params!{
		"volume" => 0.0,
		"tempo" => 120.0,
		"looping" => true,
		"instrument" => "organ",
		"notes" => "C4:1 E4:1 G4:1 C5:2",
	}
}


/// How often the scheduler wakes up.
const TICK: f64 = 0.025;

/// Notes starting within this far of now are scheduled on each tick.
const LOOKAHEAD: f64 = 0.1;

/// Delay before the first note, so it isn't scheduled in the past.
const LEAD_IN: f64 = 0.05;

/// Fraction of each note's slot that sounds. The rest separates it from the next.
const ARTICULATION: f64 = 0.9;

/// Shortest slot a note can occupy, however fast the tempo.
const MIN_NOTE_LENGTH: f64 = 0.02;


#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SongNote {
	/// `None` for a rest.
	pub midi: Option<i32>,
	pub beats: f64,
}

/// Parse a whitespace separated note list like `C4:1 E4:0.5 -:1 G#4`.
///
/// Each note is a pitch name or a rest (`-` or `R`), optionally followed by `:beats`. Beats default to 1.
pub fn parse_notes(source: &str) -> anyhow::Result<Vec<SongNote>> {
	let notes = source.split_whitespace()
		.map(parse_note)
		.collect::<anyhow::Result<Vec<_>>>()?;

	if notes.is_empty() {
		anyhow::bail!("Song has no notes");
	}

	Ok(notes)
}

fn parse_note(token: &str) -> anyhow::Result<SongNote> {
	let (name, beats) = match token.split_once(':') {
		Some((name, beats)) => {
			let beats: f64 = beats.parse()
				.with_context(|| format!("Invalid beat count in '{token}'"))?;

			(name, beats)
		}

		None => (token, 1.0),
	};

	if !beats.is_finite() || beats <= 0.0 {
		anyhow::bail!("Beat count in '{token}' must be positive");
	}

	let midi = match name {
		"-" | "R" | "r" => None,
		name => {
			let pitch: Pitch = name.parse()
				.with_context(|| format!("Invalid note '{token}'"))?;

			Some(pitch.to_midi())
		}
	};

	Ok(SongNote { midi, beats })
}


fn beat_length(params: &Table) -> f64 {
	60.0 / params.number("tempo").unwrap_or(120.0).clamp(20.0, 400.0)
}

fn note_peak(volume: f64) -> f32 {
	(volume / 4.0 * 0.55) as f32
}

fn one_shot_volume(params: &Table) -> f64 {
	let volume = raw_level(params, "volume");
	if volume > 0.0 { volume } else { ONE_SHOT_LEVEL }
}


/// Plays a note list on one instrument, scheduling a little ahead of the sample clock.
#[derive(Default)]
pub struct Song {
	notes: Vec<SongNote>,

	/// The note list `notes` was parsed from.
	source: String,

	position: usize,

	/// Sample clock time the next note starts at.
	next_at: f64,
}

impl Song {
	fn load(&mut self, params: &Table) -> bool {
		let source = choice(params, "notes", "");

		match parse_notes(source) {
			Ok(notes) => {
				self.notes = notes;
				self.source = source.to_owned();

				if self.position > self.notes.len() {
					self.position = 0;
				}

				true
			}

			Err(error) => {
				log::warn!("Song can't play '{source}': {error:#}");
				false
			}
		}
	}

	fn play_note(em: &mut Emitter<'_, '_>, params: &Table, note: SongNote, length: f64, volume: f64, at: f64) -> f64 {
		let Some(midi) = note.midi else { return at };

		let tone = voice(
			choice(params, "instrument", "organ"),
			midi_note_to_frequency(midi as f32),
			length * ARTICULATION,
			note_peak(volume),
			0.0,
			0.0,
		);

		tone.play(em, at)
	}

	/// Schedule every note starting before `now + LOOKAHEAD`. Returns false once a non-looping song has
	/// scheduled its last note.
	fn schedule_ahead(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> bool {
		let now = em.now();
		let looping = params.bool("looping").unwrap_or(true);
		let volume = raw_level(params, "volume");
		let beat = beat_length(params);

		if self.next_at < now {
			log::trace!("Song fell {:.3}s behind, resyncing", now - self.next_at);
			self.next_at = now;
		}

		while self.next_at < now + LOOKAHEAD {
			if self.position >= self.notes.len() {
				if !looping || self.notes.is_empty() {
					return false
				}

				self.position = 0;
			}

			let note = self.notes[self.position];
			let length = (note.beats * beat).max(MIN_NOTE_LENGTH);

			Song::play_note(em, params, note, length, volume, self.next_at);

			self.next_at += length;
			self.position += 1;
		}

		if self.position >= self.notes.len() && !looping {
			return false
		}

		true
	}
}

impl SoundRecipe for Song {
	fn begin(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		self.position = 0;
		if !self.load(params) {
			return None
		}

		self.next_at = em.now() + LEAD_IN;
		self.schedule_ahead(em, params);

		// Even a song that's all scheduled already finishes through a tick.
		Some(TICK)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		self.schedule_ahead(em, params).then_some(TICK)
	}

	/// The whole note list once through.
	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let now = em.now();

		let notes = match parse_notes(choice(params, "notes", "")) {
			Ok(notes) => notes,
			Err(error) => {
				log::warn!("Song can't play: {error:#}");
				return now
			}
		};

		let volume = one_shot_volume(params);

		let beat = beat_length(params);
		let mut at = now + LEAD_IN;
		let mut end = now;

		for note in notes {
			let length = (note.beats * beat).max(MIN_NOTE_LENGTH);
			end = end.max(Song::play_note(em, params, note, length, volume, at));
			at += length;
		}

		end
	}

	/// A changed note list carries on from the same position, or from the top if it's shorter.
	fn retune(&mut self, _graph: &mut NodeGraph, _now: f64, params: &Table) {
		if choice(params, "notes", "") != self.source {
			self.load(params);
		}
	}

	fn note(&mut self, em: &mut Emitter<'_, '_>, params: &Table, midi_note: f32, duration: f64) -> Option<f64> {
		let volume = one_shot_volume(params);

		let tone = voice(
			choice(params, "instrument", "organ"),
			midi_note_to_frequency(midi_note.clamp(0.0, 127.0)),
			duration,
			note_peak(volume),
			0.0,
			0.0,
		);

		let now = em.now();
		Some(tone.play(em, now))
	}

	fn end(&mut self) {
		self.position = 0;
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::sound::emit::test::{test_engine, emit_with};

	#[test]
	fn parses_notes_and_rests() {
		let notes = parse_notes("C4:1 R:0.5 Bb3:2  -  A4").unwrap();

		assert_eq!(notes, vec![
			SongNote { midi: Some(60), beats: 1.0 },
			SongNote { midi: None, beats: 0.5 },
			SongNote { midi: Some(58), beats: 2.0 },
			SongNote { midi: None, beats: 1.0 },
			SongNote { midi: Some(69), beats: 1.0 },
		]);
	}

	#[test]
	fn rejects_bad_notes() {
		assert!(parse_notes("").is_err());
		assert!(parse_notes("C4:0").is_err());
		assert!(parse_notes("C4:fast").is_err());
		assert!(parse_notes("H2").is_err());
		assert!(parse_notes("C4:1 X9:1").is_err());
	}

	#[test]
	fn schedules_only_a_little_ahead() {
		let engine = test_engine();
		let params = defaults().with("volume", 2.0).with("tempo", 60.0);
		let mut song = Song::default();

		let (tick, _) = emit_with(&engine, 1, |em| song.begin(em, &params));
		assert_eq!(tick, Some(TICK));

		// One second per beat, so only the first note fits in the lookahead.
		assert_eq!(song.position, 1);
		assert!((song.next_at - (LEAD_IN + 1.0)).abs() < 1.0e-9);
	}

	#[test]
	fn loops_back_to_the_top() {
		let engine = test_engine();
		let params = defaults().with("volume", 2.0).with("tempo", 400.0).with("notes", "C4 E4");
		let mut song = Song::default();

		emit_with(&engine, 1, |em| song.begin(em, &params));

		for _ in 0..20 {
			engine.render(400);
			let (tick, _) = emit_with(&engine, 1, |em| song.recur(em, &params));
			assert_eq!(tick, Some(TICK));
		}

		assert!(song.position <= 2);
		assert!(song.next_at > engine.current_time());
	}

	#[test]
	fn falls_silent_after_the_last_note() {
		let engine = test_engine();
		let params = defaults().with("volume", 2.0).with("tempo", 400.0).with("notes", "C4").with("looping", false);
		let mut song = Song::default();

		let (tick, _) = emit_with(&engine, 1, |em| song.begin(em, &params));
		assert_eq!(tick, Some(TICK));
		assert_eq!(song.position, 1);

		let (tick, registry) = emit_with(&engine, 1, |em| song.recur(em, &params));
		assert_eq!(tick, None);
		assert!(registry.is_empty());
	}

	#[test]
	fn retune_swaps_the_note_list() {
		let mut song = Song::default();
		assert!(song.load(&defaults()));
		assert_eq!(song.notes.len(), 4);

		let engine = test_engine();
		engine.update_graph(|ctx| song.retune(ctx.graph, ctx.now, &defaults().with("notes", "A4:2")));
		assert_eq!(song.notes.len(), 1);
		assert_eq!(song.source, "A4:2");
	}
}
