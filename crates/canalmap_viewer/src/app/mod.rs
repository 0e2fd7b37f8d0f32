mod bootstrap;
mod demo_map;
mod walkers;

pub(crate) use bootstrap::build_app;
