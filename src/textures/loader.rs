//! Photo picking and decoding off the render thread
//!
//! The native picker and the decode both run on a `photo-loader` thread;
//! finished images come back over a channel and the app uploads them on its
//! next frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;

use super::decode_photo;

/// Image types offered by the photo picker
pub const PHOTO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif"];

/// A decoded photo ready for upload
#[derive(Debug)]
pub struct LoadedPhoto {
    /// File name, used as the texture label
    pub name: String,
    pub image: RgbaImage,
}

/// Runs one photo pick at a time in the background
pub struct PhotoLoader {
    sender: Sender<LoadedPhoto>,
    receiver: Receiver<LoadedPhoto>,
    /// Set while a pick is in progress
    busy: Arc<AtomicBool>,
}

impl PhotoLoader {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(4);
        Self {
            sender,
            receiver,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a picker is open or a photo is still decoding
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Open the native file picker. Ignored while a previous pick is running.
    pub fn request(&self) {
        self.spawn(|| {
            pollster::block_on(async {
                let handle = rfd::AsyncFileDialog::new()
                    .set_title("Add a memory")
                    .add_filter("Images", PHOTO_EXTENSIONS)
                    .pick_file()
                    .await?;
                let bytes = handle.read().await;
                Some((handle.file_name(), bytes))
            })
        });
    }

    /// Run `pick` on the loader thread and decode what it returns
    fn spawn<F>(&self, pick: F)
    where
        F: FnOnce() -> Option<(String, Vec<u8>)> + Send + 'static,
    {
        if self.busy.swap(true, Ordering::AcqRel) {
            log::debug!("Photo picker already open");
            return;
        }

        let sender = self.sender.clone();
        let busy = self.busy.clone();
        let spawned = std::thread::Builder::new()
            .name("photo-loader".to_string())
            .spawn(move || {
                if let Some((name, bytes)) = pick() {
                    match decode_photo(&name, &bytes) {
                        Ok(image) => {
                            let _ = sender.send(LoadedPhoto { name, image });
                        }
                        Err(e) => log::warn!("Skipping photo: {}", e),
                    }
                }
                busy.store(false, Ordering::Release);
            });

        if let Err(e) = spawned {
            log::warn!("Failed to start photo loader: {}", e);
            self.busy.store(false, Ordering::Release);
        }
    }

    /// Next decoded photo, if one is ready
    pub fn poll(&self) -> Option<LoadedPhoto> {
        self.receiver.try_recv().ok()
    }
}

impl Default for PhotoLoader {
    fn default() -> Self {
        Self::new()
    }
}
