//! Editor form model shared by the popup and the settings manager.
//!
//! Holds the raw text of every control. Any edit recomputes the whole tuple
//! from all controls; numeric fields are clamped and rounded on commit.

use crate::services::style_rules::css_number;
use crate::types::errors::EditorError;
use crate::types::settings::{Direction, StyleTuple};

/// One control of the editor form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Font,
    FontWeight,
    FontSize,
    LineHeight,
    LetterSpacing,
    WordSpacing,
    Direction,
}

impl Control {
    pub const ALL: [Control; 7] = [
        Control::Font,
        Control::FontWeight,
        Control::FontSize,
        Control::LineHeight,
        Control::LetterSpacing,
        Control::WordSpacing,
        Control::Direction,
    ];

    /// The control's name, matching the record field it edits.
    pub fn name(&self) -> &'static str {
        match self {
            Control::Font => "font",
            Control::FontWeight => "fontWeight",
            Control::FontSize => "fontSize",
            Control::LineHeight => "lineHeight",
            Control::LetterSpacing => "letterSpacing",
            Control::WordSpacing => "wordSpacing",
            Control::Direction => "direction",
        }
    }

    pub fn parse(name: &str) -> Result<Self, EditorError> {
        Control::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .ok_or_else(|| EditorError::UnknownControl(name.to_string()))
    }

    /// Inclusive bounds and rounding of numeric controls.
    pub fn bounds(&self) -> Option<NumericBounds> {
        match self {
            Control::FontSize => Some(NumericBounds { min: 8.0, max: 72.0, decimals: 0 }),
            Control::LineHeight => Some(NumericBounds { min: 0.5, max: 4.0, decimals: 2 }),
            Control::LetterSpacing => Some(NumericBounds { min: -5.0, max: 20.0, decimals: 2 }),
            Control::WordSpacing => Some(NumericBounds { min: -10.0, max: 50.0, decimals: 2 }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericBounds {
    pub min: f64,
    pub max: f64,
    pub decimals: u32,
}

impl NumericBounds {
    /// Rounds to the field's precision, then clamps into `[min, max]`.
    pub fn commit(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.decimals as i32);
        let rounded = (value * scale).round() / scale;
        rounded.clamp(self.min, self.max)
    }
}

/// Parses and commits raw input for a numeric control. Empty or
/// non-numeric input means "default".
pub fn commit_numeric(control: Control, raw: &str) -> Option<f64> {
    let bounds = control.bounds()?;
    let value = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(bounds.commit(value))
}

fn display_number(value: Option<f64>) -> String {
    value.map(css_number).unwrap_or_default()
}

/// Current raw values of every control.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorForm {
    font: String,
    font_weight: String,
    font_size: String,
    line_height: String,
    letter_spacing: String,
    word_spacing: String,
    direction: String,
}

impl EditorForm {
    pub fn from_tuple(tuple: &StyleTuple) -> Self {
        Self {
            font: tuple.font.clone(),
            font_weight: tuple.font_weight.clone(),
            font_size: display_number(tuple.font_size),
            line_height: display_number(tuple.line_height),
            letter_spacing: display_number(tuple.letter_spacing),
            word_spacing: display_number(tuple.word_spacing),
            direction: tuple.direction.as_str().to_string(),
        }
    }

    fn slot(&mut self, control: Control) -> &mut String {
        match control {
            Control::Font => &mut self.font,
            Control::FontWeight => &mut self.font_weight,
            Control::FontSize => &mut self.font_size,
            Control::LineHeight => &mut self.line_height,
            Control::LetterSpacing => &mut self.letter_spacing,
            Control::WordSpacing => &mut self.word_spacing,
            Control::Direction => &mut self.direction,
        }
    }

    pub fn value(&self, control: Control) -> &str {
        match control {
            Control::Font => &self.font,
            Control::FontWeight => &self.font_weight,
            Control::FontSize => &self.font_size,
            Control::LineHeight => &self.line_height,
            Control::LetterSpacing => &self.letter_spacing,
            Control::WordSpacing => &self.word_spacing,
            Control::Direction => &self.direction,
        }
    }

    pub fn set(&mut self, control: Control, value: &str) {
        *self.slot(control) = value.to_string();
    }

    /// Recomputes the tuple from every control and normalizes the numeric
    /// controls to what was committed (out-of-range input shows the bound,
    /// garbage shows empty).
    pub fn commit(&mut self) -> StyleTuple {
        let tuple = StyleTuple {
            font: self.font.trim().to_string(),
            direction: Direction::parse(&self.direction),
            font_size: commit_numeric(Control::FontSize, &self.font_size),
            line_height: commit_numeric(Control::LineHeight, &self.line_height),
            font_weight: self.font_weight.trim().to_string(),
            letter_spacing: commit_numeric(Control::LetterSpacing, &self.letter_spacing),
            word_spacing: commit_numeric(Control::WordSpacing, &self.word_spacing),
        };
        *self = Self::from_tuple(&tuple);
        tuple
    }
}
