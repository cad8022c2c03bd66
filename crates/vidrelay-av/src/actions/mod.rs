//! Media processing actions.

mod brand;

pub use brand::{
    brand_video, build_ffmpeg_args, build_filter_graph, BrandSpec, Corner, EncodeSettings,
};
