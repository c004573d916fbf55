mod observer;

pub use observer::{ObserverConfig, ObserverInterpolator};
