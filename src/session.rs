//! Live preview session: a worker thread that re-renders the composite when
//! the scene changes, coalescing rapid edits through a debounce window.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::assets::AssetProvider;
use crate::preview::PreviewCompositor;
use crate::raster::RasterImage;
use crate::scene::Scene;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug)]
pub struct SessionOpts {
    /// Quiet period required before a submitted scene is rendered. Edits
    /// arriving inside the window replace the pending one.
    pub debounce: Duration,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Delivered to the session callback for every completed render attempt.
#[derive(Clone, Debug)]
pub enum PreviewUpdate {
    Frame(RasterImage),
    Failed(String),
}

enum SessionMsg {
    Submit {
        scene: Box<Scene>,
        sample: Option<Arc<RasterImage>>,
    },
    Shutdown,
}

/// Handle to the preview worker. Dropping the handle shuts the worker down
/// and joins it.
pub struct PreviewSession {
    tx: mpsc::Sender<SessionMsg>,
    worker: Option<JoinHandle<()>>,
}

impl PreviewSession {
    pub fn spawn<F>(
        icons: Arc<dyn AssetProvider>,
        fonts: Arc<dyn AssetProvider>,
        opts: SessionOpts,
        mut on_update: F,
    ) -> Self
    where
        F: FnMut(PreviewUpdate) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<SessionMsg>();
        let worker = std::thread::spawn(move || {
            let mut compositor = PreviewCompositor::new(icons, fonts);
            worker_loop(&rx, &mut compositor, opts.debounce, &mut on_update);
        });
        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Queue a scene for rendering. The most recent submission inside the
    /// debounce window wins.
    pub fn submit(&self, scene: Scene, sample: Option<Arc<RasterImage>>) {
        // A send error means the worker exited; the join in Drop surfaces it.
        let _ = self.tx.send(SessionMsg::Submit {
            scene: Box::new(scene),
            sample,
        });
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        let _ = self.tx.send(SessionMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop<F>(
    rx: &mpsc::Receiver<SessionMsg>,
    compositor: &mut PreviewCompositor,
    debounce: Duration,
    on_update: &mut F,
) where
    F: FnMut(PreviewUpdate),
{
    'outer: loop {
        let first = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => break,
        };
        let (mut scene, mut sample) = match first {
            SessionMsg::Submit { scene, sample } => (scene, sample),
            SessionMsg::Shutdown => break,
        };

        // Latest-wins drain: keep replacing the pending scene until the
        // channel stays quiet for the debounce window.
        loop {
            match rx.recv_timeout(debounce) {
                Ok(SessionMsg::Submit { scene: s, sample: f }) => {
                    scene = s;
                    sample = f;
                }
                Ok(SessionMsg::Shutdown) => break 'outer,
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => break 'outer,
            }
        }

        let update = match render_once(compositor, &scene, sample.as_deref()) {
            Ok(frame) => PreviewUpdate::Frame(frame),
            Err(e) => {
                tracing::warn!(error = %e, "preview render failed");
                PreviewUpdate::Failed(e.to_string())
            }
        };
        on_update(update);
    }
}

/// Sessions without loaded media preview over a black frame.
fn render_once(
    compositor: &mut PreviewCompositor,
    scene: &Scene,
    sample: Option<&RasterImage>,
) -> crate::error::PlatemarkResult<RasterImage> {
    match sample {
        Some(frame) => compositor.render(scene, frame),
        None => {
            let black = RasterImage::filled(
                scene.canvas.width,
                scene.canvas.height,
                crate::color::Color::BLACK,
            )?;
            compositor.render(scene, &black)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_opts_use_the_standard_debounce() {
        assert_eq!(SessionOpts::default().debounce, DEFAULT_DEBOUNCE);
    }
}
