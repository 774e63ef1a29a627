pub(crate) mod tasks;
pub(crate) mod viewer;
