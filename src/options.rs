//! Render option parsing.
//!
//! Variant requests arrive as a compact, dash-separated token string taken
//! straight from a public URL:
//!
//! ```text
//! w600-h400-z1-cfff0a0-e1
//! ```
//!
//! Each token is a one-character key followed by its value:
//!
//! | Key | Value | Fallback on malformed input |
//! |-----|-------|-----------------------------|
//! | `w` | width in pixels, `> 0` | unset |
//! | `h` | height in pixels, `> 0` | unset |
//! | `q` | encode quality | `72` |
//! | `c` | canvas color, 6 hex digits | `ffffff` |
//! | `e` | placeholder on missing source, `0` or `1` | `1` |
//! | `z` | crop policy, `0`–`3` | `0` |
//!
//! Order does not matter and the last token for a key wins. Unknown keys are
//! ignored.
//!
//! [`parse_options`] is total: it never fails and never produces a dimension
//! outside the configured [`DimensionLimits`]. Untrusted URL input can only
//! ever select among safe values.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default encode quality when `q` is absent or malformed.
pub const DEFAULT_QUALITY: u32 = 72;

/// Default canvas color when `c` is absent or malformed.
pub const DEFAULT_CANVAS: &str = "ffffff";

/// How source dimensions map onto the requested box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum CropPolicy {
    /// Proportional shrink, never larger than the source.
    #[default]
    None,
    /// Shrunk source centred on a solid canvas of the requested size.
    CanvasFit,
    /// Fill the requested box, then centre-crop to it exactly.
    ExactFill,
    /// Proportional fit inside the requested box, shrink only, no canvas.
    ProportionalFit,
    /// Source geometry verbatim.
    Original,
}

impl CropPolicy {
    /// Numeric code used in URLs and hashes.
    pub fn code(self) -> i8 {
        match self {
            CropPolicy::None => 0,
            CropPolicy::CanvasFit => 1,
            CropPolicy::ExactFill => 2,
            CropPolicy::ProportionalFit => 3,
            CropPolicy::Original => -1,
        }
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(CropPolicy::None),
            1 => Some(CropPolicy::CanvasFit),
            2 => Some(CropPolicy::ExactFill),
            3 => Some(CropPolicy::ProportionalFit),
            -1 => Some(CropPolicy::Original),
            _ => None,
        }
    }
}

impl From<CropPolicy> for i8 {
    fn from(policy: CropPolicy) -> Self {
        policy.code()
    }
}

impl TryFrom<i8> for CropPolicy {
    type Error = String;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        CropPolicy::from_code(code).ok_or_else(|| format!("unknown crop policy {code}"))
    }
}

/// Bounds applied to requested dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DimensionLimits {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for DimensionLimits {
    fn default() -> Self {
        Self {
            min_width: 50,
            min_height: 50,
            max_width: 2560,
            max_height: 2560,
        }
    }
}

/// Validated, immutable rendering options for one variant.
///
/// Construct through [`parse_options`]; the `with_*` methods return modified
/// copies and never touch the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    width: Option<u32>,
    height: Option<u32>,
    crop: CropPolicy,
    canvas_color: String,
    quality: u32,
    missing_placeholder: bool,
}

/// Canonical field set fed to the fingerprint. Field order is part of the
/// on-disk cache format.
#[derive(Serialize)]
struct HashFields<'a> {
    w: Option<u32>,
    h: Option<u32>,
    c: &'a str,
    e: bool,
    z: i8,
    q: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            crop: CropPolicy::None,
            canvas_color: DEFAULT_CANVAS.to_string(),
            quality: DEFAULT_QUALITY,
            missing_placeholder: true,
        }
    }
}

impl RenderOptions {
    /// Options asking for the source's own geometry and nothing else.
    pub fn original() -> Self {
        Self {
            crop: CropPolicy::Original,
            ..Self::default()
        }
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    pub fn crop(&self) -> CropPolicy {
        self.crop
    }

    pub fn canvas_color(&self) -> &str {
        &self.canvas_color
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    pub fn missing_placeholder(&self) -> bool {
        self.missing_placeholder
    }

    /// True when neither dimension was requested.
    pub fn is_missing_all_size(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    pub fn with_width(&self, width: Option<u32>) -> Self {
        Self {
            width,
            ..self.clone()
        }
    }

    pub fn with_height(&self, height: Option<u32>) -> Self {
        Self {
            height,
            ..self.clone()
        }
    }

    pub fn with_crop(&self, crop: CropPolicy) -> Self {
        Self {
            crop,
            ..self.clone()
        }
    }

    pub fn with_quality(&self, quality: u32) -> Self {
        Self {
            quality,
            ..self.clone()
        }
    }

    pub fn with_canvas_color(&self, color: &str) -> Self {
        Self {
            canvas_color: normalize_hex(color).unwrap_or_else(|| DEFAULT_CANVAS.to_string()),
            ..self.clone()
        }
    }

    pub fn with_missing_placeholder(&self, missing_placeholder: bool) -> Self {
        Self {
            missing_placeholder,
            ..self.clone()
        }
    }

    /// Deterministic fingerprint of the six option fields.
    ///
    /// SHA-256 over a canonical JSON encoding, truncated to 32 hex characters.
    /// Stable across runs and processes; used to tell cached variants apart.
    pub fn hash(&self) -> String {
        let fields = HashFields {
            w: self.width,
            h: self.height,
            c: &self.canvas_color,
            e: self.missing_placeholder,
            z: self.crop.code(),
            q: self.quality,
        };
        // Serializing a struct of plain scalars cannot fail.
        let canonical = serde_json::to_vec(&fields).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        let mut hex = format!("{:x}", digest);
        hex.truncate(32);
        hex
    }

    /// Clamp dimensions into `limits`, or fall back to the minimum box when
    /// nothing was requested. `Original` clears both and skips limits.
    fn apply_limits(mut self, limits: &DimensionLimits) -> Self {
        if self.crop == CropPolicy::Original {
            self.width = None;
            self.height = None;
            return self;
        }

        if self.is_missing_all_size() {
            self.width = Some(limits.min_width);
            self.height = Some(limits.min_height);
            return self;
        }

        self.width = self
            .width
            .map(|w| w.clamp(limits.min_width, limits.max_width));
        self.height = self
            .height
            .map(|h| h.clamp(limits.min_height, limits.max_height));
        self
    }
}

/// Parse a token string into options bounded by `limits`.
///
/// Never fails. Empty input yields the defaults with the minimum box.
pub fn parse_options(args: &str, limits: &DimensionLimits) -> RenderOptions {
    parse_tokens(args, RenderOptions::default()).apply_limits(limits)
}

/// Parse tokens on top of `base`, then apply limits. Used when a caller
/// fixes some fields (e.g. `Original`) before URL tokens are read.
pub fn parse_options_with(
    args: &str,
    base: RenderOptions,
    limits: &DimensionLimits,
) -> RenderOptions {
    parse_tokens(args, base).apply_limits(limits)
}

fn parse_tokens(args: &str, mut options: RenderOptions) -> RenderOptions {
    for token in args.split('-') {
        let mut chars = token.chars();
        let Some(key) = chars.next() else {
            continue;
        };
        let value = chars.as_str();

        match key {
            'w' => options.width = parse_digits(value).filter(|&w| w > 0),
            'h' => options.height = parse_digits(value).filter(|&h| h > 0),
            'q' => options.quality = parse_digits(value).unwrap_or(DEFAULT_QUALITY),
            'c' => {
                options.canvas_color =
                    normalize_hex(value).unwrap_or_else(|| DEFAULT_CANVAS.to_string())
            }
            'e' => options.missing_placeholder = value != "0",
            'z' => {
                options.crop = match value {
                    "0" => CropPolicy::None,
                    "1" => CropPolicy::CanvasFit,
                    "2" => CropPolicy::ExactFill,
                    "3" => CropPolicy::ProportionalFit,
                    _ => CropPolicy::None,
                }
            }
            _ => {}
        }
    }
    options
}

/// Digits-only values; anything longer than `u32` saturates so that the
/// later clamp still applies.
fn parse_digits(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(value.parse::<u32>().unwrap_or(u32::MAX))
}

/// Exactly six hex digits, lowercased.
fn normalize_hex(value: &str) -> Option<String> {
    if value.len() == 6 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(value.to_ascii_lowercase())
    } else {
        None
    }
}
