//! Event signals and the event trait

use core::fmt;

/// Numeric event discriminator.
///
/// Signals form one flat namespace per build. `INIT` is delivered by the
/// framework itself; application signals start at `USER`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(pub u16);

impl Signal {
    /// Dispatched once to every active object before its event loop starts
    pub const INIT: Signal = Signal(0);

    /// First signal available to applications
    pub const USER: Signal = Signal(1);

    /// Create a signal from a raw value
    pub const fn new(raw: u16) -> Self {
        Signal(raw)
    }

    /// Application signal `offset` places above `USER`
    pub const fn user(offset: u16) -> Self {
        Signal(Self::USER.0 + offset)
    }

    /// Get the raw signal value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// True for signals owned by the framework
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::USER.0
    }
}

impl From<u16> for Signal {
    #[inline]
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG({:#06x})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Signal {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "SIG({=u16:#x})", self.0);
    }
}

/// A message handed to an active object.
///
/// Implementors are a closed set of variants, each of which reports its
/// signal regardless of payload. Events travel by value through the queue.
pub trait Event: Send + 'static {
    /// Signal identifying this event
    fn signal(&self) -> Signal;

    /// The reserved `INIT` event of this event set
    fn init() -> Self
    where
        Self: Sized;

    /// Check if this is a framework-reserved event
    fn is_reserved(&self) -> bool {
        self.signal().is_reserved()
    }
}

/// Define a closed event set.
///
/// The generated enum gets an implicit `Init` variant carrying
/// [`Signal::INIT`]; every listed variant is bound to its signal.
///
/// ```
/// use freeact_core::{define_events, Event, Signal};
///
/// define_events! {
///     pub enum BlinkyEvent {
///         Timeout = Signal::user(0),
///         SetRate(u32) = Signal::user(1),
///     }
/// }
///
/// assert_eq!(BlinkyEvent::init().signal(), Signal::INIT);
/// assert_eq!(BlinkyEvent::SetRate(5).signal(), Signal::user(1));
/// ```
#[macro_export]
macro_rules! define_events {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident $(( $($data:ty),+ $(,)? ))? = $signal:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis enum $name {
            /// Reserved initialization event
            Init,
            $(
                $(#[$vmeta])*
                $variant $(( $($data),+ ))?,
            )*
        }

        impl $crate::Event for $name {
            fn signal(&self) -> $crate::Signal {
                match self {
                    $name::Init => $crate::Signal::INIT,
                    $(
                        $name::$variant { .. } => $signal,
                    )*
                }
            }

            fn init() -> Self {
                $name::Init
            }
        }
    };
}
