pub mod app;
pub mod renderer;
pub mod surface;

pub use app::{run, DisplayApp, DisplayEvent, ProxySignal};
pub use renderer::{fit_viewport, rgb_to_rgba, QuadRenderer, Viewport};
pub use surface::DisplaySurface;
