use std::fmt;
use std::str::FromStr;


/// Convert a midi note to a frequency.
/// Note 69 is A4 (440Hz). The fractional part gives sub-semitone shifts.
pub fn midi_note_to_frequency(midi_note: f32) -> f32 {
	440.0 * ((midi_note - 69.0)/12.0).exp2()
}

pub fn frequency_to_midi_note(frequency: f32) -> f32 {
	(frequency/440.0).log2() * 12.0 + 69.0
}

/// Frequency ratio for a shift of `cents` hundredths of a semitone.
pub fn cents_to_ratio(cents: f32) -> f32 {
	(cents / 1200.0).exp2()
}

pub fn lerp(t: f32, from: f32, to: f32) -> f32 {
	from + (to - from) * t
}

/// Map `value` from [0, `max`] onto [0, 1].
pub fn unit(value: f64, max: f64) -> f32 {
	(value / max).clamp(0.0, 1.0) as f32
}



#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PitchClass {
	C, Cs,
	D, Ds,
	E,
	F, Fs,
	G, Gs,
	A, As,
	B,
}

impl PitchClass {
	pub fn semitone(&self) -> i32 {
		match self {
			PitchClass::C => 0,
			PitchClass::Cs => 1,
			PitchClass::D => 2,
			PitchClass::Ds => 3,
			PitchClass::E => 4,
			PitchClass::F => 5,
			PitchClass::Fs => 6,
			PitchClass::G => 7,
			PitchClass::Gs => 8,
			PitchClass::A => 9,
			PitchClass::As => 10,
			PitchClass::B => 11,
		}
	}

	pub fn from_semitone(semitone: i32) -> PitchClass {
		const CLASSES: [PitchClass; 12] = [
			PitchClass::C, PitchClass::Cs, PitchClass::D, PitchClass::Ds, PitchClass::E, PitchClass::F,
			PitchClass::Fs, PitchClass::G, PitchClass::Gs, PitchClass::A, PitchClass::As, PitchClass::B,
		];

		CLASSES[semitone.rem_euclid(12) as usize]
	}

	pub fn to_midi(&self, octave: i32) -> i32 {
		(octave+1)*12 + self.semitone()
	}
}

impl fmt::Display for PitchClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
		NAMES[self.semitone() as usize].fmt(f)
	}
}


/// A named note, e.g. `C4`, `F#3` or `Bb5`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pitch {
	pub pitch_class: PitchClass,
	pub octave: i32,
}

impl Pitch {
	pub fn from_midi(midi_note: i32) -> Pitch {
		Pitch {
			pitch_class: PitchClass::from_semitone(midi_note),
			octave: midi_note.div_euclid(12) - 1,
		}
	}

	pub fn to_midi(&self) -> i32 {
		self.pitch_class.to_midi(self.octave)
	}

	pub fn to_frequency(&self) -> f32 {
		midi_note_to_frequency(self.to_midi() as f32)
	}
}

impl fmt::Display for Pitch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.pitch_class, self.octave)
	}
}

impl FromStr for Pitch {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> anyhow::Result<Pitch> {
		let mut chars = s.trim().chars().peekable();

		let letter = chars.next()
			.ok_or_else(|| anyhow::anyhow!("Empty note name"))?;

		let natural = match letter.to_ascii_uppercase() {
			'C' => 0, 'D' => 2, 'E' => 4, 'F' => 5, 'G' => 7, 'A' => 9, 'B' => 11,
			_ => anyhow::bail!("Invalid note name '{s}'"),
		};

		let accidental = match chars.peek() {
			Some('#') => { chars.next(); 1 }
			Some('b') => { chars.next(); -1 }
			_ => 0,
		};

		let octave: String = chars.collect();
		let octave: i32 = octave.parse()
			.map_err(|_| anyhow::anyhow!("Invalid octave in note name '{s}'"))?;

		Ok(Pitch::from_midi((octave + 1) * 12 + natural + accidental))
	}
}




#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn a4_is_440() {
		assert_eq!(midi_note_to_frequency(69.0), 440.0);
		assert!((frequency_to_midi_note(880.0) - 81.0).abs() < 1.0e-4);
	}

	#[test]
	fn parse_pitches() {
		let c4: Pitch = "C4".parse().unwrap();
		assert_eq!(c4.to_midi(), 60);

		let fs3: Pitch = "F#3".parse().unwrap();
		assert_eq!(fs3.to_midi(), 54);
		assert_eq!(fs3.to_string(), "F#3");

		let bb5: Pitch = "Bb5".parse().unwrap();
		assert_eq!(bb5.pitch_class, PitchClass::As);
		assert_eq!(bb5.octave, 5);

		// Flat below C wraps into the previous octave.
		let cb4: Pitch = "Cb4".parse().unwrap();
		assert_eq!(cb4, Pitch { pitch_class: PitchClass::B, octave: 3 });

		assert!((("A4".parse::<Pitch>().unwrap()).to_frequency() - 440.0).abs() < 1.0e-3);
	}

	#[test]
	fn parse_rejects_garbage() {
		assert!("".parse::<Pitch>().is_err());
		assert!("H2".parse::<Pitch>().is_err());
		assert!("C".parse::<Pitch>().is_err());
		assert!("C#x".parse::<Pitch>().is_err());
	}

	#[test]
	fn cents() {
		assert!((cents_to_ratio(1200.0) - 2.0).abs() < 1.0e-5);
		assert_eq!(cents_to_ratio(0.0), 1.0);
	}
}
