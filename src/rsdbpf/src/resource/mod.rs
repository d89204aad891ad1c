mod cas_part;
mod cas_preset;
mod default;
mod image;
mod key;
mod modular;
mod name_map;
mod registry;
mod rle;
mod sim_data;
mod sim_outfit;
mod skin_tone;
mod template;
mod tgi_block;

use std::any::Any;

use paste::paste;

pub use cas_part::{CasPart, LodBlock, LodAsset, PartFlag, PartOverride, SwatchColor};
pub use cas_preset::{CasPreset, PresetModifier};
pub use default::DefaultResource;
pub use image::{ImageFormat, ImageResource};
pub use key::ResourceKey;
pub use modular::Modular;
pub use name_map::NameMap;
pub use registry::{
    create_resource, global_registry, register_global, ResourceFactory, ResourceRegistry,
};
pub use rle::RleResource;
pub use sim_data::{SimData, SimDataField, SimDataFieldType, SimDataSchema, SimDataTable};
pub use sim_outfit::{SimOutfit, SliderReference, UnknownBlock};
pub use skin_tone::{SkinTone, SkinToneFlag, SkinToneOverlay};
pub use template::{Template, TemplateEntry, TemplateGroup};
pub use tgi_block::{read_tgi_list, write_tgi_list, TgiBlock, TgiOrder};

use crate::Result;

/// A parsed resource: the key it was loaded under, its in-memory state,
/// and a dirty flag.
///
/// Wrappers parse from bytes (an empty span installs defaults), serialize
/// back to bytes, and are round-trip lossless: serializing an unmodified
/// resource reproduces the source bytes exactly. A clean resource that
/// still holds its source bytes returns them without re-encoding.
pub trait Resource: std::fmt::Debug + Send {
    fn key(&self) -> ResourceKey;

    fn is_dirty(&self) -> bool;

    /// Flag the in-memory state as modified so the next [`Resource::serialize`]
    /// re-encodes instead of replaying the source bytes.
    fn mark_dirty(&mut self);

    fn serialize(&self) -> Result<Vec<u8>>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub type BoxResource = Box<dyn Resource>;

macro_rules! impl_downcast {
    ($($ty:ident),+ $(,)?) => {
        paste! {
            impl dyn Resource {
                $(
                    pub fn [<as_ $ty:snake>](&self) -> Option<&$ty> {
                        self.as_any().downcast_ref::<$ty>()
                    }

                    pub fn [<as_ $ty:snake _mut>](&mut self) -> Option<&mut $ty> {
                        self.as_any_mut().downcast_mut::<$ty>()
                    }
                )+
            }
        }
    };
}

impl_downcast!(
    DefaultResource,
    NameMap,
    ImageResource,
    RleResource,
    SimData,
    CasPart,
    SimOutfit,
    SkinTone,
    Modular,
    Template,
    CasPreset,
);
