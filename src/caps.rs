//! Detection of the accelerated forward-move instructions.
//!
//! Detection runs once per process. With the `std` feature the result lives in a `OnceLock`,
//! without it in an atomic that is written once (detection is idempotent, so a racing second
//! detection stores the same value).

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicU8, Ordering};

/// Environment variable that masks the detected capabilities (read once, `std` only).
///
/// Accepts `auto`/`all`, `none`, `byte`, `word` or a comma separated list such as `byte,word`.
pub const CAPS_ENV_VAR: &str = "FASTMOVE_CAPS";

/// Which accelerated forward-move instructions the running processor supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities {
    /// Enhanced `rep movsb` (ERMS).
    pub fast_byte_move: bool,
    /// The x86-64 baseline, which brings `rep movsq`.
    pub fast_word_arch: bool,
}

impl Capabilities {
    /// Capabilities with the given flags.
    pub const fn new(fast_byte_move: bool, fast_word_arch: bool) -> Self {
        Capabilities {
            fast_byte_move,
            fast_word_arch,
        }
    }

    /// No accelerated instruction, every move goes through the fallback.
    pub const fn none() -> Self {
        Capabilities::new(false, false)
    }

    /// Both accelerated instructions.
    pub const fn all() -> Self {
        Capabilities::new(true, true)
    }

    /// Whether any fast path may be taken.
    #[inline]
    pub const fn any(self) -> bool {
        self.fast_byte_move || self.fast_word_arch
    }

    /// Keeps only the capabilities present in both `self` and `mask`.
    pub const fn mask(self, mask: Capabilities) -> Self {
        Capabilities::new(
            self.fast_byte_move && mask.fast_byte_move,
            self.fast_word_arch && mask.fast_word_arch,
        )
    }

    /// Queries the processor. Does not consult the cache or [`CAPS_ENV_VAR`].
    pub fn detect() -> Self {
        detect_hardware()
    }

    /// The process wide capabilities: detected on first use, masked by [`CAPS_ENV_VAR`].
    #[inline]
    pub fn get() -> Self {
        cache::get_or_init(init)
    }

    #[cfg_attr(feature = "std", allow(dead_code))]
    fn to_bits(self) -> u8 {
        self.fast_byte_move as u8 | (self.fast_word_arch as u8) << 1
    }

    #[cfg_attr(feature = "std", allow(dead_code))]
    fn from_bits(bits: u8) -> Self {
        Capabilities::new(bits & 1 != 0, bits & 2 != 0)
    }
}

fn init() -> Capabilities {
    let detected = Capabilities::detect();
    let caps = detected.mask(env_mask());
    tracing::debug!(
        fast_byte_move = caps.fast_byte_move,
        fast_word_arch = caps.fast_word_arch,
        masked = caps != detected,
        "move capabilities detected"
    );
    caps
}

#[cfg(feature = "std")]
fn env_mask() -> Capabilities {
    mask_from_env(std::env::var(CAPS_ENV_VAR).ok().as_deref())
}

#[cfg(not(feature = "std"))]
fn env_mask() -> Capabilities {
    mask_from_env(None)
}

/// The mask for a [`CAPS_ENV_VAR`] value. Unset or unparsable values mask nothing.
fn mask_from_env(value: Option<&str>) -> Capabilities {
    let Some(value) = value else {
        return Capabilities::all();
    };
    match value.parse() {
        Ok(mask) => mask,
        Err(err) => {
            tracing::warn!(%err, value = %value, "ignoring {}", CAPS_ENV_VAR);
            Capabilities::all()
        }
    }
}

#[cfg(feature = "std")]
mod cache {
    use super::Capabilities;
    use std::sync::OnceLock;

    static CAPS: OnceLock<Capabilities> = OnceLock::new();

    #[inline]
    pub(super) fn get_or_init(init: fn() -> Capabilities) -> Capabilities {
        *CAPS.get_or_init(init)
    }
}

#[cfg(not(feature = "std"))]
mod cache {
    use super::{AtomicCapabilities, Capabilities};

    static CAPS: AtomicCapabilities = AtomicCapabilities::new();

    #[inline]
    pub(super) fn get_or_init(init: fn() -> Capabilities) -> Capabilities {
        CAPS.get_or_init(init)
    }
}

/// A [`Capabilities`] slot that is written once, for targets without `OnceLock`.
#[cfg_attr(feature = "std", allow(dead_code))]
struct AtomicCapabilities(AtomicU8);

#[cfg_attr(feature = "std", allow(dead_code))]
impl AtomicCapabilities {
    const UNINIT: u8 = 0x80;

    const fn new() -> Self {
        AtomicCapabilities(AtomicU8::new(Self::UNINIT))
    }

    #[inline]
    fn get_or_init(&self, init: impl FnOnce() -> Capabilities) -> Capabilities {
        let bits = self.0.load(Ordering::Acquire);
        if bits != Self::UNINIT {
            return Capabilities::from_bits(bits);
        }
        let caps = init();
        self.0.store(caps.to_bits(), Ordering::Release);
        caps
    }
}

#[cfg(all(target_arch = "x86_64", not(miri), not(feature = "portable")))]
#[allow(unused_unsafe)]
fn detect_hardware() -> Capabilities {
    use core::arch::x86_64::{__cpuid, __cpuid_count, __get_cpuid_max};

    const EBX_ERMS: u32 = 1 << 9;
    const EDX_SSE2: u32 = 1 << 26;

    // SAFETY: `cpuid` exists on every x86-64 processor and the leaves are range checked.
    unsafe {
        let (max_leaf, _) = __get_cpuid_max(0);
        let sse2 = max_leaf >= 1 && __cpuid(1).edx & EDX_SSE2 != 0;
        let erms = max_leaf >= 7 && __cpuid_count(7, 0).ebx & EBX_ERMS != 0;
        Capabilities::new(erms, sse2)
    }
}

#[cfg(not(all(target_arch = "x86_64", not(miri), not(feature = "portable"))))]
fn detect_hardware() -> Capabilities {
    Capabilities::none()
}

/// An error parsing a [`Capabilities`] mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCapabilitiesError {
    /// The input contains no capability name.
    Empty,
    /// A name that is not `byte`, `word`, `all`, `auto` or `none`.
    UnknownCapability(String),
    /// `all`, `auto` or `none` combined with other names.
    ExclusiveKeyword(String),
}

impl fmt::Display for ParseCapabilitiesError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseCapabilitiesError::Empty => f.write_str("no capability given"),
            ParseCapabilitiesError::UnknownCapability(name) => {
                write!(f, "unknown capability {:?}", name)
            }
            ParseCapabilitiesError::ExclusiveKeyword(name) => {
                write!(f, "{:?} cannot be combined with other capabilities", name)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseCapabilitiesError {}

impl FromStr for Capabilities {
    type Err = ParseCapabilitiesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let names = s.split(',').map(str::trim).filter(|name| !name.is_empty());
        let count = names.clone().count();
        if count == 0 {
            return Err(ParseCapabilitiesError::Empty);
        }

        let mut caps = Capabilities::none();
        for name in names {
            let lower = name.to_ascii_lowercase();
            match lower.as_str() {
                "byte" | "movsb" | "erms" => caps.fast_byte_move = true,
                "word" | "movsq" => caps.fast_word_arch = true,
                "all" | "auto" | "none" if count > 1 => {
                    return Err(ParseCapabilitiesError::ExclusiveKeyword(name.to_string()))
                }
                "all" | "auto" => return Ok(Capabilities::all()),
                "none" => return Ok(Capabilities::none()),
                _ => return Err(ParseCapabilitiesError::UnknownCapability(name.to_string())),
            }
        }
        Ok(caps)
    }
}
