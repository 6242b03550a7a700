//! Snare rudiment presets

use super::track::Track;
use super::Pattern;

/// One stroke of a sticking pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sticking {
    Right,
    Left,
    Rest,
}

impl Sticking {
    pub fn letter(self) -> Option<char> {
        match self {
            Sticking::Right => Some('R'),
            Sticking::Left => Some('L'),
            Sticking::Rest => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Rudiment {
    pub id: &'static str,
    pub name: &'static str,
    pub sticking: &'static [Sticking],
    pub description: &'static str,
}

impl Rudiment {
    pub fn find(id: &str) -> Option<&'static Rudiment> {
        RUDIMENTS.iter().find(|r| r.id == id)
    }

    /// Sticking for a grid step; the sequence loops over the grid
    pub fn sticking_at(&self, step: usize) -> Sticking {
        self.sticking[step % self.sticking.len()]
    }

    /// Empty grid with the snare row played wherever the sticking is not a rest
    pub fn to_pattern(&self, steps: usize) -> Pattern {
        let mut pattern = Pattern::new(steps);
        for step in 0..steps {
            if self.sticking_at(step) != Sticking::Rest {
                pattern.set(Track::Snare, step, true);
            }
        }
        pattern
    }
}

use Sticking::{Left as L, Rest as X, Right as R};

pub static RUDIMENTS: [Rudiment; 9] = [
    Rudiment {
        id: "single_stroke",
        name: "Single Stroke Roll",
        sticking: &[R, L, R, L, R, L, R, L, R, L, R, L, R, L, R, L],
        description: "Alternating single strokes. The foundation of all drumming.",
    },
    Rudiment {
        id: "double_stroke",
        name: "Double Stroke Roll",
        sticking: &[R, R, L, L, R, R, L, L, R, R, L, L, R, R, L, L],
        description: "Alternating double strokes. Essential for smooth rolls.",
    },
    Rudiment {
        id: "paradiddle",
        name: "Single Paradiddle",
        sticking: &[R, L, R, R, L, R, L, L, R, L, R, R, L, R, L, L],
        description: "Combination of single and double strokes.",
    },
    Rudiment {
        id: "double_paradiddle",
        name: "Double Paradiddle",
        sticking: &[R, L, R, L, R, R, L, R, L, R, L, L],
        description: "Two single strokes followed by a double stroke.",
    },
    Rudiment {
        id: "triple_paradiddle",
        name: "Triple Paradiddle",
        sticking: &[R, L, R, L, R, L, R, R, L, R, L, R, L, R, L, L],
        description: "Three single strokes followed by a double stroke.",
    },
    Rudiment {
        id: "paradiddle_diddle",
        name: "Paradiddle-Diddle",
        sticking: &[R, L, R, R, L, L, R, L, R, R, L, L],
        description: "A paradiddle followed by a double stroke. Great for 6/8 time.",
    },
    Rudiment {
        id: "five_stroke",
        name: "Five Stroke Roll",
        sticking: &[R, R, L, L, R, X, X, X],
        description: "Two doubles followed by an accent.",
    },
    Rudiment {
        id: "six_stroke",
        name: "Six Stroke Roll",
        sticking: &[R, L, L, R, R, L, X, X],
        description: "Single, two doubles, single. (Adapted for 16ths)",
    },
    Rudiment {
        id: "single_stroke_four",
        name: "Single Stroke Four",
        sticking: &[R, L, R, L, X, X, X, X],
        description: "Four single strokes followed by rests.",
    },
];
