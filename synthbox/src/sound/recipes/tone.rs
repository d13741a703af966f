use crate::prelude::*;
use crate::audio::Lfo;
use crate::audio::util::midi_note_to_frequency;
use crate::audio::waveform::Waveform;
use crate::sound::emit::Emitter;
use crate::sound::patterns::{HarmonicTone, ToneShape, Partial};
use crate::sound::recipe::{SoundRecipe, Choice, raw_level, choice};


pub const GOVERNING: &str = "level";
pub const CHOICES: &[Choice] = &[
	("instrument", &["sine", "organ", "bell", "pluck", "flute", "brass"]),
];

pub fn defaults() -> Table {
	params!{
		"level" => 0.0,
		"velocity" => 2.0,
		"note" => 69.0,
		"duration" => 1.0,
		"instrument" => "sine",
		"vibrato" => 0.0,
		"tremolo" => 0.0,
	}
}


/// Level used for one-shots and notes while the governing level is zero.
pub const ONE_SHOT_LEVEL: f64 = 2.0;

/// Gap left between repeats of a held note.
const REPEAT_GAP: f64 = 0.1;


/// A pitched voice for `instrument`, sounding for roughly `duration` seconds.
///
/// `vibrato` and `tremolo` run 0 to 4; zero leaves them off.
pub fn voice(instrument: &str, frequency: f32, duration: f64, peak: f32, vibrato: f64, tremolo: f64) -> HarmonicTone {
	let duration = duration.max(0.0);

	let tone = match instrument {
		"organ" => HarmonicTone::new(frequency, ToneShape::Held { attack: 0.02, sustain: duration, release: 0.15 })
			.partials([
				Partial::new(1.0, 1.0),
				Partial::new(2.0, 0.5),
				Partial::new(3.0, 0.3),
				Partial::new(4.0, 0.2),
				Partial::new(6.0, 0.1),
			]),

		"bell" => HarmonicTone::new(frequency, ToneShape::Struck { decay: 1.5 * duration.max(0.5) })
			.partials([
				Partial::new(1.0, 1.0),
				Partial::new(2.0, 0.6).decay(0.8),
				Partial::new(2.4, 0.4).decay(0.6),
				Partial::new(3.0, 0.3).decay(0.5),
				Partial::new(4.2, 0.2).decay(0.35),
				Partial::new(5.4, 0.15).decay(0.25),
			])
			.detune_spread(3.0),

		"pluck" => HarmonicTone::new(frequency, ToneShape::Struck { decay: 0.4 + 0.3 * duration.min(2.0) })
			.waveform(Waveform::Triangle)
			.partials([
				Partial::new(1.0, 1.0),
				Partial::new(2.0, 0.5).decay(0.6),
				Partial::new(3.0, 0.25).decay(0.4),
			]),

		"flute" => HarmonicTone::new(frequency, ToneShape::Held { attack: 0.08, sustain: duration, release: 0.12 })
			.partials([
				Partial::new(1.0, 1.0),
				Partial::new(2.0, 0.2),
				Partial::new(3.0, 0.05),
			]),

		"brass" => HarmonicTone::new(frequency, ToneShape::Held { attack: 0.05, sustain: duration, release: 0.1 })
			.waveform(Waveform::Saw)
			.partials([Partial::new(1.0, 1.0), Partial::new(1.0, 1.0)])
			.detune_spread(4.0),

		_ => HarmonicTone::new(frequency, ToneShape::Held { attack: 0.01, sustain: duration, release: 0.1 }),
	};

	let mut tone = tone.peak(peak);

	if vibrato > 0.0 {
		tone = tone.vibrato(Lfo::sine(5.5, 8.0 * vibrato.min(4.0) as f32));
	}

	if tremolo > 0.0 {
		tone = tone.tremolo(Lfo::sine(6.0, 0.15 * tremolo.min(4.0) as f32));
	}

	tone
}


fn one_shot_level(params: &Table, key: &str) -> f64 {
	let level = raw_level(params, key);
	if level > 0.0 { level } else { ONE_SHOT_LEVEL }
}

fn peak(level: f64, velocity: f64) -> f32 {
	(level / 4.0 * (0.3 + 0.7 * velocity / 4.0) * 0.8) as f32
}


/// A single instrument note, repeated while active.
#[derive(Default)]
pub struct Tone;

impl Tone {
	fn play(em: &mut Emitter<'_, '_>, params: &Table, midi_note: f32, duration: f64, level: f64, at: f64) -> f64 {
		let tone = voice(
			choice(params, "instrument", "sine"),
			midi_note_to_frequency(midi_note),
			duration,
			peak(level, raw_level(params, "velocity")),
			raw_level(params, "vibrato"),
			raw_level(params, "tremolo"),
		);

		tone.play(em, at)
	}

	fn note_params(params: &Table) -> (f32, f64) {
		let midi_note = params.number("note").unwrap_or(69.0).clamp(0.0, 127.0) as f32;
		let duration = params.number("duration").unwrap_or(1.0).clamp(0.0, 30.0);
		(midi_note, duration)
	}
}

impl SoundRecipe for Tone {
	fn begin(&mut self, _em: &mut Emitter<'_, '_>, _params: &Table) -> Option<f64> {
		Some(0.0)
	}

	fn recur(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> Option<f64> {
		let (midi_note, duration) = Tone::note_params(params);
		let now = em.now();

		let end = Tone::play(em, params, midi_note, duration, raw_level(params, "level"), now);
		Some(end - now + REPEAT_GAP)
	}

	fn burst(&mut self, em: &mut Emitter<'_, '_>, params: &Table) -> f64 {
		let (midi_note, duration) = Tone::note_params(params);
		let now = em.now();
		Tone::play(em, params, midi_note, duration, one_shot_level(params, "level"), now)
	}

	fn note(&mut self, em: &mut Emitter<'_, '_>, params: &Table, midi_note: f32, duration: f64) -> Option<f64> {
		let now = em.now();
		Some(Tone::play(em, params, midi_note.clamp(0.0, 127.0), duration, one_shot_level(params, "level"), now))
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::sound::emit::test::{test_engine, emit_with};

	#[test]
	fn sine_voice_is_held() {
		let tone = voice("sine", 440.0, 1.39, 0.5, 0.0, 0.0);
		assert_eq!(tone.shape, ToneShape::Held { attack: 0.01, sustain: 1.39, release: 0.1 });
		assert!(tone.vibrato.is_none());
		assert!(tone.tremolo.is_none());

		let tone = voice("flute", 440.0, 1.0, 0.5, 2.0, 4.0);
		assert_eq!(tone.vibrato.unwrap().depth, 16.0);
		assert!((tone.tremolo.unwrap().depth - 0.6).abs() < 1.0e-6);
	}

	#[test]
	fn velocity_shapes_peak() {
		assert_eq!(peak(0.0, 4.0), 0.0);
		assert!(peak(4.0, 0.0) < peak(4.0, 4.0));
		assert!((peak(4.0, 4.0) - 0.8).abs() < 1.0e-6);
	}

	#[test]
	fn repeats_leave_a_gap() {
		let engine = test_engine();
		let params = defaults().with("level", 2.0).with("duration", 0.5);

		let (delay, _) = emit_with(&engine, 1, |em| Tone.recur(em, &params));
		assert!((delay.unwrap() - (0.01 + 0.5 + 0.1 + REPEAT_GAP)).abs() < 1.0e-9);
	}

	#[test]
	fn every_instrument_plays_a_note() {
		let engine = test_engine();

		for &instrument in CHOICES[0].1 {
			let params = defaults().with("instrument", instrument);
			let (end, registry) = emit_with(&engine, 1, |em| Tone.note(em, &params, 60.0, 0.3));

			let end = end.unwrap();
			assert!(end > 0.3 && end < 2.0, "{instrument}: {end}");
			assert!(!registry.is_empty(), "{instrument}");
		}
	}
}
