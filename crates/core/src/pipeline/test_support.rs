//! In-memory pipeline components for tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::detection::domain::object_detector::{DetectorLoader, ObjectDetector};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// Ordered record of lifecycle calls across all stubs.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: &str) {
        self.0.lock().unwrap().push(event.to_string());
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn solid_frame(index: usize, w: u32, h: u32) -> Frame {
    Frame::new(vec![100; (w * h * 3) as usize], w, h, 3, index)
}

pub fn metadata(w: u32, h: u32, total_frames: usize) -> VideoMetadata {
    VideoMetadata {
        width: w,
        height: h,
        fps: 30.0,
        frame_rate: (30, 1),
        total_frames,
        codec: "stub".to_string(),
        source_path: None,
    }
}

pub fn frames(count: usize) -> Vec<Frame> {
    (0..count).map(|i| solid_frame(i, 16, 16)).collect()
}

pub struct StubReader {
    frames: Vec<Frame>,
    metadata: VideoMetadata,
    events: EventLog,
    pub fail_open: bool,
    /// Yield an error instead of the frame at this position.
    pub fail_at: Option<usize>,
    /// Raise the cancellation flag while decoding this frame index.
    pub cancel_at: Option<(usize, Arc<AtomicBool>)>,
    /// Simulated decode time per frame.
    pub decode_delay: Option<Duration>,
}

impl StubReader {
    pub fn new(frames: Vec<Frame>, events: EventLog) -> Self {
        let metadata = metadata(16, 16, frames.len());
        Self {
            frames,
            metadata,
            events,
            fail_open: false,
            fail_at: None,
            cancel_at: None,
            decode_delay: None,
        }
    }
}

impl VideoReader for StubReader {
    fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        self.events.push("reader.open");
        if self.fail_open {
            return Err("no such file".into());
        }
        Ok(self.metadata.clone())
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let fail_at = self.fail_at;
        let cancel_at = self.cancel_at.clone();
        let delay = self.decode_delay;
        Box::new(self.frames.drain(..).enumerate().map(move |(i, f)| {
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            if let Some((at, flag)) = &cancel_at {
                if *at == i {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            if Some(i) == fail_at {
                Err("corrupt packet".into())
            } else {
                Ok(f)
            }
        }))
    }

    fn close(&mut self) {
        self.events.push("reader.close");
    }
}

pub struct StubWriter {
    pub written: Arc<Mutex<Vec<Frame>>>,
    events: EventLog,
    pub fail_open: bool,
    pub fail_write_at: Option<usize>,
    pub fail_close: bool,
}

impl StubWriter {
    pub fn new(events: EventLog) -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            events,
            fail_open: false,
            fail_write_at: None,
            fail_close: false,
        }
    }
}

impl VideoWriter for StubWriter {
    fn open(
        &mut self,
        _path: &Path,
        _metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.events.push("writer.open");
        if self.fail_open {
            return Err("permission denied".into());
        }
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let mut written = self.written.lock().unwrap();
        if Some(written.len()) == self.fail_write_at {
            return Err("disk full".into());
        }
        written.push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.events.push("writer.close");
        if self.fail_close {
            return Err("trailer write failed".into());
        }
        Ok(())
    }
}

type Script = Box<dyn Fn(usize) -> Vec<Detection> + Send>;

/// Returns detections chosen by frame index.
pub struct ScriptedDetector {
    script: Script,
    pub calls: Arc<Mutex<Vec<usize>>>,
    pub fail_at: Option<usize>,
    /// Raise the cancellation flag while detecting this frame index.
    pub cancel_at: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedDetector {
    pub fn new(script: impl Fn(usize) -> Vec<Detection> + Send + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_at: None,
            cancel_at: None,
        }
    }

    /// One `"Pothole"` on frames 0..5, one `"Crack"` after.
    pub fn potholes_then_cracks() -> Self {
        Self::new(|i| vec![detection(if i < 5 { "Pothole" } else { "Crack" }, 0.8)])
    }

    pub fn empty() -> Self {
        Self::new(|_| Vec::new())
    }
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        self.calls.lock().unwrap().push(frame.index());
        if let Some((at, flag)) = &self.cancel_at {
            if frame.index() == *at {
                flag.store(true, Ordering::SeqCst);
            }
        }
        if Some(frame.index()) == self.fail_at {
            return Err("inference failed".into());
        }
        Ok((self.script)(frame.index()))
    }
}

pub fn detection(label: &str, confidence: f64) -> Detection {
    Detection::new(label, confidence, BoundingBox::new(2.0, 2.0, 6.0, 6.0))
}

pub struct StubLoader {
    detector: Mutex<Option<Box<dyn ObjectDetector>>>,
    events: EventLog,
}

impl StubLoader {
    pub fn new(detector: impl ObjectDetector + 'static, events: EventLog) -> Self {
        Self {
            detector: Mutex::new(Some(Box::new(detector))),
            events,
        }
    }

    pub fn failing(events: EventLog) -> Self {
        Self {
            detector: Mutex::new(None),
            events,
        }
    }
}

impl DetectorLoader for StubLoader {
    fn load(&self) -> Result<Box<dyn ObjectDetector>, Box<dyn std::error::Error>> {
        self.events.push("detector.load");
        self.detector
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| "model file is corrupt".into())
    }
}

/// Copies the frame and stamps the detection count into its first byte.
pub struct TagAnnotator;

impl FrameAnnotator for TagAnnotator {
    fn annotate(
        &self,
        frame: &Frame,
        detections: &[Detection],
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let mut data = frame.data().to_vec();
        data[0] = detections.len() as u8;
        Ok(Frame::new(
            data,
            frame.width(),
            frame.height(),
            frame.channels(),
            frame.index(),
        ))
    }
}
