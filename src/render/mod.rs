pub(crate) mod blend;
pub(crate) mod compositor;
pub(crate) mod decode;
pub(crate) mod playback;
pub(crate) mod plan;
