//! Counters which feed the packet sequence count and the VC frame count.
//!
//! The codecs themselves are stateless. Whoever emits packets or frames owns one of these
//! providers per APID or virtual channel and passes the current value into the header.
//!
//! ## Example
//!
//! ```rust
//! use spacelink::seq_count::{SequenceCountProvider, VcFrameCountProvider};
//! use spacelink::uslp::FrameParams;
//!
//! // One octet frame count, wraps after 255.
//! let counter = VcFrameCountProvider::new(1).unwrap();
//! let params = FrameParams::new(3).with_frame_count(counter.selector(), counter.get_and_increment());
//! assert_eq!(params.vc_frame_count, 0);
//! assert_eq!(counter.get(), 1);
//! ```
use crate::bits::max_value_for_width;
use crate::uslp::{ConfigurationError, MissionConfig};
use crate::MAX_SEQ_COUNT;
use core::cell::Cell;
use paste::paste;

/// Core trait for objects which can provide a sequence count.
///
/// The core functions are not mutable on purpose to allow easier usage with
/// static structs when using the interior mutability pattern. This can be achieved by using
/// [Cell], [core::cell::RefCell] or atomic types.
pub trait SequenceCountProvider {
    type Raw: Into<u64>;

    fn get(&self) -> Self::Raw;

    fn increment(&self);

    fn get_and_increment(&self) -> Self::Raw {
        let val = self.get();
        self.increment();
        val
    }
}

/// Counter which wraps to zero after reaching a configurable maximum value.
#[derive(Debug, Clone)]
pub struct SeqCountProviderSimple<T: Copy> {
    seq_count: Cell<T>,
    max_val: T,
}

macro_rules! impl_for_primitives {
    ($($ty: ident,)+) => {
        $(
            paste! {
                impl SeqCountProviderSimple<$ty> {
                    pub fn [<new_custom_max_val_ $ty>](max_val: $ty) -> Self {
                        Self {
                            seq_count: Cell::new(0),
                            max_val,
                        }
                    }
                    pub fn [<new_ $ty>]() -> Self {
                        Self::[<new_custom_max_val_ $ty>]($ty::MAX)
                    }
                }

                impl Default for SeqCountProviderSimple<$ty> {
                    fn default() -> Self {
                        Self::[<new_ $ty>]()
                    }
                }

                impl SequenceCountProvider for SeqCountProviderSimple<$ty> {
                    type Raw = $ty;

                    fn get(&self) -> Self::Raw {
                        self.seq_count.get()
                    }

                    fn increment(&self) {
                        self.get_and_increment();
                    }

                    fn get_and_increment(&self) -> Self::Raw {
                        let curr_count = self.seq_count.get();
                        if curr_count >= self.max_val {
                            self.seq_count.set(0);
                        } else {
                            self.seq_count.set(curr_count + 1);
                        }
                        curr_count
                    }
                }
            }
        )+
    }
}

impl_for_primitives!(u8, u16, u32, u64,);

/// Space packet sequence count provider which wraps around at [MAX_SEQ_COUNT].
#[derive(Debug, Clone)]
pub struct CcsdsSimpleSeqCountProvider {
    provider: SeqCountProviderSimple<u16>,
}

impl Default for CcsdsSimpleSeqCountProvider {
    fn default() -> Self {
        Self {
            provider: SeqCountProviderSimple::new_custom_max_val_u16(MAX_SEQ_COUNT),
        }
    }
}

impl SequenceCountProvider for CcsdsSimpleSeqCountProvider {
    type Raw = u16;
    delegate::delegate! {
        to self.provider {
            fn get(&self) -> u16;
            fn increment(&self);
            fn get_and_increment(&self) -> u16;
        }
    }
}

/// VC frame count provider which wraps at the width of the frame count field.
#[derive(Debug, Clone)]
pub struct VcFrameCountProvider {
    provider: SeqCountProviderSimple<u64>,
    octets: u8,
}

impl VcFrameCountProvider {
    /// Counter for a frame count field of `octets` width. A width of zero always yields zero.
    pub fn new(octets: u8) -> Result<Self, ConfigurationError> {
        if octets > 8 {
            return Err(ConfigurationError::InvalidFrameCountWidth(octets));
        }
        Ok(Self {
            provider: SeqCountProviderSimple::new_custom_max_val_u64(max_value_for_width(
                octets as usize * 8,
            )),
            octets,
        })
    }

    /// Counter matching the frame count width the mission uses for frames with `selector`.
    pub fn for_config(config: &MissionConfig, selector: u8) -> Result<Self, ConfigurationError> {
        Self::new(config.frame_count_width.octets(selector) as u8)
    }

    /// Width of the frame count field in octets.
    #[inline]
    pub fn octets(&self) -> u8 {
        self.octets
    }

    /// Frame count length selector matching the counter width. The selector field holds at most
    /// seven octets.
    #[inline]
    pub fn selector(&self) -> u8 {
        self.octets.min(7)
    }
}

impl SequenceCountProvider for VcFrameCountProvider {
    type Raw = u64;
    delegate::delegate! {
        to self.provider {
            fn get(&self) -> u64;
            fn increment(&self);
            fn get_and_increment(&self) -> u64;
        }
    }
}
