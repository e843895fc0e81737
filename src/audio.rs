use log::info;

/// Background-music switch. The terminal build has no mixer, so this only
/// tracks state and logs transitions; the persisted `bgm_on` preference is
/// pushed through `sync` whenever it may have changed.
#[derive(Debug, Default)]
pub struct BgmController {
    playing: bool,
}

impl BgmController {
    pub fn start(&mut self) {
        if !self.playing {
            self.playing = true;
            info!("bgm on");
        }
    }

    pub fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            info!("bgm off");
        }
    }

    pub fn sync(&mut self, wanted: bool) {
        if wanted {
            self.start();
        } else {
            self.stop();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Drop for BgmController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_follows_the_preference() {
        let mut bgm = BgmController::default();
        assert!(!bgm.is_playing());
        bgm.sync(true);
        bgm.sync(true);
        assert!(bgm.is_playing());
        bgm.sync(false);
        assert!(!bgm.is_playing());
    }
}
