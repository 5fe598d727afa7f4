use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::filter::{FilterConfig, Mode, QualityLevel};

/// Shared handle to the filter settings.
///
/// Writers swap in a whole new [`FilterConfig`]; the processing thread loads
/// one snapshot per frame, so a change never lands halfway through a frame.
#[derive(Clone)]
pub struct FilterControls {
    config: Arc<ArcSwap<FilterConfig>>,
}

impl FilterControls {
    pub fn new(initial: FilterConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn current(&self) -> FilterConfig {
        **self.config.load()
    }

    pub fn set_mode(&self, mode: Mode) {
        self.update(|config| config.mode = mode);
        info!(?mode, "Filter mode changed");
    }

    pub fn set_quality_level(&self, quality: QualityLevel) {
        self.update(|config| config.quality = quality);
        info!(?quality, "Filter quality changed");
    }

    pub fn toggle_mode(&self) -> Mode {
        let previous = self.config.rcu(|config| {
            let mut next = **config;
            next.mode = next.mode.toggled();
            next
        });
        let mode = previous.mode.toggled();
        info!(?mode, "Filter mode toggled");
        mode
    }

    fn update(&self, change: impl Fn(&mut FilterConfig)) {
        self.config.rcu(|config| {
            let mut next = **config;
            change(&mut next);
            next
        });
    }
}

impl Default for FilterControls {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn setters_change_one_field() {
        let controls = FilterControls::default();
        controls.set_quality_level(QualityLevel::High);
        controls.set_mode(Mode::RawPassthrough);

        assert_eq!(
            controls.current(),
            FilterConfig {
                mode: Mode::RawPassthrough,
                quality: QualityLevel::High,
            }
        );
    }

    #[test]
    fn toggle_flips_mode() {
        let controls = FilterControls::default();
        assert_eq!(controls.toggle_mode(), Mode::RawPassthrough);
        assert_eq!(controls.toggle_mode(), Mode::EdgeDetect);
        assert_eq!(controls.current().quality, QualityLevel::Normal);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let controls = FilterControls::default();
        let quality = {
            let controls = controls.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    controls.set_quality_level(QualityLevel::Fast);
                }
            })
        };
        for _ in 0..500 {
            controls.set_mode(Mode::RawPassthrough);
        }
        quality.join().unwrap();

        assert_eq!(
            controls.current(),
            FilterConfig {
                mode: Mode::RawPassthrough,
                quality: QualityLevel::Fast,
            }
        );
    }
}
