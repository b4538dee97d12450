//! Static font-metric tables for the built-in fallback fonts.
//!
//! Character widths are in em units (relative to font size), taken from the
//! Adobe AFM files for the standard Helvetica faces. These fonts need no
//! embedding, which is what makes them a safe last resort when no TrueType
//! candidate loads. They only cover WinAnsi text: anything outside printable
//! ASCII is drawn as `?`, so it is measured as `?` too.
//! All tables cover ASCII 0x20..=0x7E (95 printable characters).
//! Index = (char as usize) - 32.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Measurement seam
// ────────────────────────────────────────────────────────────────────────────

/// Anything that can report the advance width of a character at a font size.
///
/// The wrapper and the page engine only ever measure through this trait, so
/// embedded TrueType fonts, the built-in tables, and test stubs are
/// interchangeable.
pub trait TextMeasure {
    /// Advance width of `ch` in points at `size` points.
    fn char_width(&self, ch: char, size: f32) -> f32;

    /// Width of a whole string in points. No kerning is applied, so this is
    /// always the plain sum of `char_width` over the characters.
    fn string_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.char_width(c, size)).sum()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in faces
// ────────────────────────────────────────────────────────────────────────────

/// The two standard PDF faces used when no TrueType font could be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinFace {
    Helvetica,
    HelveticaBold,
}

impl BuiltinFace {
    /// The PostScript name written into the PDF font dictionary.
    pub fn base_font(self) -> &'static str {
        match self {
            BuiltinFace::Helvetica => "Helvetica",
            BuiltinFace::HelveticaBold => "Helvetica-Bold",
        }
    }

    pub fn metrics(self) -> &'static FontMetricTable {
        match self {
            BuiltinFace::Helvetica => &HELVETICA_TABLE,
            BuiltinFace::HelveticaBold => &HELVETICA_BOLD_TABLE,
        }
    }
}

/// Static character-width table for a built-in face.
///
/// `widths[i]` = width of ASCII character `(i + 32)` in em units.
///
/// Width array slot layout:
/// ```text
/// [0]=sp  [1]=!   [2]="   [3]=#   [4]=$   [5]=%   [6]=&   [7]='
/// [8]=(   [9]=)   [10]=*  [11]=+  [12]=,  [13]=-  [14]=.  [15]=/
/// [16..25]=0-9
/// [26]=:  [27]=;  [28]=<  [29]==  [30]=>  [31]=?  [32]=@
/// [33..58]=A-Z
/// [59]=[  [60]=\  [61]=]  [62]=^  [63]=_  [64]=`
/// [65..90]=a-z
/// [91]={  [92]=|  [93]=}  [94]=~
/// ```
pub struct FontMetricTable {
    pub face: BuiltinFace,
    widths: [f32; 95],
    pub ascent: f32,
    pub descent: f32,
}

impl FontMetricTable {
    /// Width in em units of a single character.
    ///
    /// Characters outside printable ASCII are replaced by `?` when drawn.
    pub fn em_width(&self, ch: char) -> f32 {
        self.widths[Self::slot(ch)]
    }

    /// Maps a character to the byte actually written to the content stream.
    pub fn encode_char(ch: char) -> u8 {
        let code = ch as u32;
        if (32..=126).contains(&code) {
            code as u8
        } else {
            b'?'
        }
    }

    fn slot(ch: char) -> usize {
        Self::encode_char(ch) as usize - 32
    }
}

impl TextMeasure for FontMetricTable {
    fn char_width(&self, ch: char, size: f32) -> f32 {
        self.em_width(ch) * size
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Static width tables  (95 ASCII printable characters each)
// ────────────────────────────────────────────────────────────────────────────

static HELVETICA_TABLE: FontMetricTable = FontMetricTable {
    face: BuiltinFace::Helvetica,
    #[rustfmt::skip]
    widths: [
        // sp    !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.278, 0.355, 0.556, 0.556, 0.889, 0.667, 0.191, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0     1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :     ;      <      =      >      ?      @
        0.278, 0.278, 0.584, 0.584, 0.584, 0.556, 1.015,
        // A     B      C      D      E      F      G      H      I      J      K      L      M
        0.667, 0.667, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.500, 0.667, 0.556, 0.833,
        // N     O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [     \      ]      ^      _      `
        0.278, 0.278, 0.278, 0.469, 0.556, 0.333,
        // a     b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.556, 0.500, 0.556, 0.556, 0.278, 0.556, 0.556, 0.222, 0.222, 0.500, 0.222, 0.833,
        // n     o      p      q      r      s      t      u      v      w      x      y      z
        0.556, 0.556, 0.556, 0.556, 0.333, 0.500, 0.278, 0.556, 0.500, 0.722, 0.500, 0.500, 0.500,
        // {     |      }      ~
        0.334, 0.260, 0.334, 0.584,
    ],
    ascent: 0.718,
    descent: -0.207,
};

static HELVETICA_BOLD_TABLE: FontMetricTable = FontMetricTable {
    face: BuiltinFace::HelveticaBold,
    #[rustfmt::skip]
    widths: [
        // sp    !      "      #      $      %      &      '      (      )      *      +      ,      -      .      /
        0.278, 0.333, 0.474, 0.556, 0.556, 0.889, 0.722, 0.238, 0.333, 0.333, 0.389, 0.584, 0.278, 0.333, 0.278, 0.278,
        // 0     1      2      3      4      5      6      7      8      9
        0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556, 0.556,
        // :     ;      <      =      >      ?      @
        0.333, 0.333, 0.584, 0.584, 0.584, 0.611, 0.975,
        // A     B      C      D      E      F      G      H      I      J      K      L      M
        0.722, 0.722, 0.722, 0.722, 0.667, 0.611, 0.778, 0.722, 0.278, 0.556, 0.722, 0.611, 0.833,
        // N     O      P      Q      R      S      T      U      V      W      X      Y      Z
        0.722, 0.778, 0.667, 0.778, 0.722, 0.667, 0.611, 0.722, 0.667, 0.944, 0.667, 0.667, 0.611,
        // [     \      ]      ^      _      `
        0.333, 0.278, 0.333, 0.584, 0.556, 0.333,
        // a     b      c      d      e      f      g      h      i      j      k      l      m
        0.556, 0.611, 0.556, 0.611, 0.556, 0.333, 0.611, 0.611, 0.278, 0.278, 0.556, 0.278, 0.889,
        // n     o      p      q      r      s      t      u      v      w      x      y      z
        0.611, 0.611, 0.611, 0.611, 0.389, 0.556, 0.333, 0.611, 0.556, 0.778, 0.556, 0.556, 0.500,
        // {     |      }      ~
        0.389, 0.280, 0.389, 0.584,
    ],
    ascent: 0.718,
    descent: -0.207,
};

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
