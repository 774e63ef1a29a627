pub(crate) mod canonical;
pub(crate) mod edit;
pub(crate) mod id;
pub(crate) mod manifest;
pub(crate) mod node;
pub(crate) mod reid;
pub(crate) mod store;
