// Domain layer - Core model and rules

pub mod model;
pub mod rules;
