//! Fixed track table - one row of the grid per percussion voice

/// How a hit is drawn on the staff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSymbol {
    Triangle,
    CrossCircle,
    Cross,
    X,
    Circle,
}

/// Notation voice used for stems and beaming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceGroup {
    /// Hands, stems up
    Upper,
    /// Feet, stems down
    Lower,
}

/// A percussion track. Rows are ordered top to bottom as in `Track::ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Metronome,
    HihatOpen,
    HihatClosed,
    Clap,
    Snare,
    TomLow,
    Kick,
}

impl Track {
    pub const COUNT: usize = 7;

    pub const ALL: [Track; Track::COUNT] = [
        Track::Metronome,
        Track::HihatOpen,
        Track::HihatClosed,
        Track::Clap,
        Track::Snare,
        Track::TomLow,
        Track::Kick,
    ];

    /// Row index in the pattern grid
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Track> {
        Track::ALL.get(index).copied()
    }

    /// Stable identifier used by proposals and the CLI
    pub fn id(self) -> &'static str {
        match self {
            Track::Metronome => "metronome",
            Track::HihatOpen => "hihat_open",
            Track::HihatClosed => "hihat_closed",
            Track::Clap => "clap",
            Track::Snare => "snare",
            Track::TomLow => "tom_low",
            Track::Kick => "kick",
        }
    }

    pub fn from_id(id: &str) -> Option<Track> {
        Track::ALL.into_iter().find(|track| track.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Track::Metronome => "Metronome",
            Track::HihatOpen => "Hihat Op",
            Track::HihatClosed => "Hihat Cl",
            Track::Clap => "Clap",
            Track::Snare => "Snare",
            Track::TomLow => "Tom Low",
            Track::Kick => "Kick",
        }
    }

    /// General MIDI percussion note (channel 10)
    pub fn midi_note(self) -> u8 {
        match self {
            // Hi wood block, shared with the woodblock voice
            Track::Metronome => 76,
            Track::HihatOpen => 46,
            Track::HihatClosed => 42,
            Track::Clap => 39,
            Track::Snare => 38,
            Track::TomLow => 45,
            Track::Kick => 36,
        }
    }

    /// Vertical staff offset in half-line units; negative is above the top line
    pub fn staff_offset(self) -> i8 {
        match self {
            Track::Metronome => -15,
            Track::HihatOpen | Track::HihatClosed => -5,
            Track::Clap | Track::Snare => 15,
            Track::TomLow => 25,
            Track::Kick => 45,
        }
    }

    pub fn symbol(self) -> NoteSymbol {
        match self {
            Track::Metronome => NoteSymbol::Triangle,
            Track::HihatOpen => NoteSymbol::CrossCircle,
            Track::HihatClosed => NoteSymbol::Cross,
            Track::Clap => NoteSymbol::X,
            Track::Snare | Track::TomLow | Track::Kick => NoteSymbol::Circle,
        }
    }

    pub fn voice_group(self) -> VoiceGroup {
        match self {
            Track::Kick => VoiceGroup::Lower,
            _ => VoiceGroup::Upper,
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
