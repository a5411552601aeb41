use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use iced::widget::image::Handle;
use iced::widget::{container, row};
use iced::{Element, Length, Subscription, Task, Theme};

use lookout_core::pipeline::run_control::RunControl;
use lookout_core::shared::constants::{
    DEFAULT_IMAGE_OUTPUT, DEFAULT_VIDEO_OUTPUT, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS,
};
use lookout_core::shared::input_source::InputSource;
use lookout_core::shared::settings::Device;

use crate::panels;
use crate::settings::{Appearance, InputType, Settings};
use crate::theme;
use crate::workers::detect_worker::{self, ImageView, Job, JobParams, WorkerMessage};
use crate::workers::model_cache::ModelCache;

/// Per-frame detail lines kept for the scrolling list.
const MAX_DETAIL_LINES: usize = 200;
const POLL_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Clone)]
pub enum Message {
    InputTypeChanged(InputType),
    MaxDetectionsChanged(u32),
    DeviceChanged(Device),
    ConfidenceChanged(f32),
    SaveResultChanged(bool),
    AppearanceChanged(Appearance),
    SelectImage,
    ImageSelected(Option<PathBuf>),
    SelectVideo,
    VideoSelected(Option<PathBuf>),
    StartWebcam,
    IpUrlChanged(String),
    StartIpCamera,
    Stop,
    TakeSnapshot,
    AutoSnapshotChanged(bool),
    SnapshotIntervalChanged(u32),
    DownloadImage,
    ImageDestinationChosen(Option<PathBuf>),
    SaveVideo,
    VideoDestinationChosen(Option<PathBuf>),
    ShowInFolder(PathBuf),
    TryAgain,
    StartOver,
    Tick,
    PollSystemTheme,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Idle,
    Preparing,
    Downloading(u64, u64),
    Running,
    Stopping,
    Finished,
    Error(String),
}

impl RunState {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            RunState::Preparing | RunState::Downloading(..) | RunState::Running | RunState::Stopping
        )
    }
}

/// Output of the latest video, webcam or IP camera run.
#[derive(Default)]
pub struct LiveView {
    pub frame: Option<Handle>,
    pub snapshot: Option<Handle>,
    pub details: VecDeque<String>,
    pub frames: usize,
    pub warning: Option<String>,
    pub recording: Option<PathBuf>,
}

impl LiveView {
    fn push_detail(&mut self, line: String) {
        if self.details.len() == MAX_DETAIL_LINES {
            self.details.pop_front();
        }
        self.details.push_back(line);
    }
}

struct ActiveJob {
    receiver: Receiver<WorkerMessage>,
    control: Arc<RunControl>,
}

pub struct App {
    pub settings: Settings,
    model_cache: Arc<ModelCache>,
    pub state: RunState,
    job: Option<ActiveJob>,
    last_job: Option<Job>,
    pub image_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub ip_url: String,
    pub image: Option<ImageView>,
    pub live: LiveView,
    /// Owns the temp recording; the file goes away with it.
    recording_dir: Option<tempfile::TempDir>,
    pub saved_to: Option<PathBuf>,
    pub notice: Option<String>,
    /// OS dark-mode preference, refreshed by the theme poll.
    system_dark: bool,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        let model_cache = ModelCache::new();
        model_cache.preload(settings.device());
        (
            Self {
                settings,
                model_cache,
                state: RunState::Idle,
                job: None,
                last_job: None,
                image_path: None,
                video_path: None,
                ip_url: String::new(),
                image: None,
                live: LiveView::default(),
                recording_dir: None,
                saved_to: None,
                notice: None,
                system_dark: theme::system_prefers_dark(),
            },
            Task::none(),
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputTypeChanged(input_type) => {
                if input_type != self.settings.input_type {
                    self.reset();
                    self.settings.input_type = input_type;
                    self.settings.save();
                }
            }
            Message::MaxDetectionsChanged(value) => {
                self.settings.max_detections = value;
                self.settings.save();
                self.push_thresholds();
            }
            Message::ConfidenceChanged(value) => {
                self.settings.confidence = (value * 100.0).round() / 100.0;
                self.settings.save();
                self.push_thresholds();
            }
            Message::DeviceChanged(device) => {
                self.settings.device = device.to_string();
                self.settings.save();
                self.model_cache.preload(device);
            }
            Message::SaveResultChanged(enabled) => {
                self.settings.save_result = enabled;
                self.settings.save();
            }
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
                self.settings.save();
                if appearance == Appearance::System {
                    self.system_dark = theme::system_prefers_dark();
                }
            }
            Message::SelectImage => {
                return pick_file("Select an image", "Images", IMAGE_EXTENSIONS)
                    .map(Message::ImageSelected);
            }
            Message::ImageSelected(Some(path)) => {
                self.image_path = Some(path.clone());
                self.start(Job::Image(path));
            }
            Message::SelectVideo => {
                return pick_file("Select a video", "Videos", VIDEO_EXTENSIONS)
                    .map(Message::VideoSelected);
            }
            Message::VideoSelected(Some(path)) => {
                self.video_path = Some(path.clone());
                match InputSource::from_path(path) {
                    Ok(source) => self.start(Job::Stream(source)),
                    Err(e) => self.state = RunState::Error(e.to_string()),
                }
            }
            Message::ImageSelected(None) | Message::VideoSelected(None) => {}
            Message::StartWebcam => self.start(Job::Stream(InputSource::Webcam(0))),
            Message::IpUrlChanged(url) => self.ip_url = url,
            Message::StartIpCamera => match InputSource::ip_camera(&self.ip_url) {
                Ok(source) => self.start(Job::Stream(source)),
                Err(e) => self.notice = Some(format!("Please enter a valid IP camera URL: {e}")),
            },
            Message::Stop => {
                if let Some(job) = &self.job {
                    job.control.cancel();
                    self.state = RunState::Stopping;
                }
            }
            Message::TakeSnapshot => {
                if let Some(job) = &self.job {
                    job.control.request_snapshot();
                }
            }
            Message::AutoSnapshotChanged(enabled) => {
                self.settings.auto_snapshot = enabled;
                self.settings.save();
                if let Some(job) = &self.job {
                    job.control.set_auto_snapshot(enabled);
                }
            }
            Message::SnapshotIntervalChanged(secs) => {
                self.settings.snapshot_interval_secs = secs;
                self.settings.save();
                if let Some(job) = &self.job {
                    job.control
                        .set_snapshot_interval(Duration::from_secs(u64::from(secs)));
                }
            }
            Message::DownloadImage => {
                return save_dialog("Save result image", DEFAULT_IMAGE_OUTPUT)
                    .map(Message::ImageDestinationChosen);
            }
            Message::ImageDestinationChosen(Some(path)) => {
                if let Some(bytes) = self.image.as_ref().and_then(|view| view.jpeg.as_ref()) {
                    self.finish_save(std::fs::write(&path, bytes), path);
                }
            }
            Message::SaveVideo => {
                return save_dialog("Save processed video", DEFAULT_VIDEO_OUTPUT)
                    .map(Message::VideoDestinationChosen);
            }
            Message::VideoDestinationChosen(Some(path)) => {
                if let Some(recording) = self.live.recording.clone() {
                    self.finish_save(std::fs::copy(recording, &path).map(|_| ()), path);
                }
            }
            Message::ImageDestinationChosen(None) | Message::VideoDestinationChosen(None) => {}
            Message::ShowInFolder(path) => {
                let folder = path.parent().map(PathBuf::from).unwrap_or(path);
                if let Err(e) = open::that(&folder) {
                    log::warn!("Could not open {}: {e}", folder.display());
                }
            }
            Message::TryAgain => {
                if let Some(job) = self.last_job.clone() {
                    self.start(job);
                }
            }
            Message::StartOver => {
                self.reset();
                self.image_path = None;
                self.video_path = None;
            }
            Message::Tick => self.drain_worker(),
            Message::PollSystemTheme => self.system_dark = theme::system_prefers_dark(),
        }
        Task::none()
    }

    pub fn view(&self) -> Element<'_, Message> {
        let theme = self.theme();
        let sidebar = panels::sidebar::view(self, &theme);
        let main = container(panels::main_panel(self, &theme))
            .padding(20)
            .width(Length::Fill)
            .height(Length::Fill);

        row![sidebar, main].height(Length::Fill).into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance, self.system_dark)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let poll = if self.job.is_some() {
            iced::time::every(POLL_INTERVAL).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };
        let system_theme = if self.settings.appearance == Appearance::System {
            iced::time::every(Duration::from_secs(2)).map(|_| Message::PollSystemTheme)
        } else {
            Subscription::none()
        };
        Subscription::batch([poll, system_theme])
    }

    fn start(&mut self, job: Job) {
        self.reset();
        let settings = self.settings.detection_settings();

        let recording = match (&job, settings.save_result) {
            (Job::Stream(_), true) => match tempfile::Builder::new().prefix("lookout-").tempdir() {
                Ok(dir) => {
                    let path = dir.path().join(DEFAULT_VIDEO_OUTPUT);
                    self.recording_dir = Some(dir);
                    Some(path)
                }
                Err(e) => {
                    self.state = RunState::Error(format!("Could not create recording: {e}"));
                    return;
                }
            },
            _ => None,
        };

        let control = Arc::new(RunControl::new(
            &settings,
            self.settings.auto_snapshot,
            Duration::from_secs(u64::from(self.settings.snapshot_interval_secs)),
        ));
        log::info!("Starting {job:?} on {}", settings.device);
        let receiver = detect_worker::spawn(
            JobParams {
                job: job.clone(),
                settings,
                recording,
                model_cache: self.model_cache.clone(),
            },
            control.clone(),
        );

        self.job = Some(ActiveJob { receiver, control });
        self.last_job = Some(job);
        self.state = RunState::Preparing;
    }

    /// Cancels any running job and clears its output.
    fn reset(&mut self) {
        if let Some(job) = self.job.take() {
            job.control.cancel();
        }
        self.state = RunState::Idle;
        self.image = None;
        self.live = LiveView::default();
        self.recording_dir = None;
        self.saved_to = None;
        self.notice = None;
    }

    fn push_thresholds(&self) {
        if let Some(job) = &self.job {
            job.control.set_thresholds(
                f64::from(self.settings.confidence),
                self.settings.max_detections as usize,
            );
        }
    }

    fn drain_worker(&mut self) {
        let Some(receiver) = self.job.as_ref().map(|job| job.receiver.clone()) else {
            return;
        };
        let mut done = false;
        loop {
            match receiver.try_recv() {
                Ok(message) => {
                    done = self.apply(message);
                    if done {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.state.is_busy() {
                        self.state = RunState::Error("Detection stopped unexpectedly".into());
                    }
                    done = true;
                    break;
                }
            }
        }
        if done {
            self.job = None;
        }
    }

    /// Applies one worker message; returns true when the job is over.
    fn apply(&mut self, message: WorkerMessage) -> bool {
        match message {
            WorkerMessage::DownloadProgress(downloaded, total) => {
                self.state = RunState::Downloading(downloaded, total);
                false
            }
            WorkerMessage::Started => {
                if self.state != RunState::Stopping {
                    self.state = RunState::Running;
                }
                false
            }
            WorkerMessage::ImageReady(view) => {
                self.image = Some(*view);
                self.state = RunState::Finished;
                true
            }
            WorkerMessage::Frame(view) => {
                self.live.frames += 1;
                if view.snapshot {
                    self.live.snapshot = Some(view.frame.clone());
                }
                self.live.frame = Some(view.frame);
                self.live.push_detail(view.report);
                false
            }
            WorkerMessage::Finished(summary) => {
                self.live.warning = summary.warning;
                self.live.recording = summary.recording;
                self.state = RunState::Finished;
                true
            }
            WorkerMessage::Error(e) => {
                self.state = RunState::Error(e);
                true
            }
        }
    }

    fn finish_save(&mut self, result: std::io::Result<()>, path: PathBuf) {
        match result {
            Ok(()) => {
                log::info!("Saved {}", path.display());
                self.saved_to = Some(path);
                self.notice = None;
            }
            Err(e) => self.notice = Some(format!("Could not save {}: {e}", path.display())),
        }
    }
}

fn pick_file(
    title: &'static str,
    filter: &'static str,
    extensions: &'static [&'static str],
) -> Task<Option<PathBuf>> {
    Task::perform(
        async move {
            rfd::AsyncFileDialog::new()
                .set_title(title)
                .add_filter(filter, extensions)
                .pick_file()
                .await
                .map(|h| h.path().to_path_buf())
        },
        |path| path,
    )
}

fn save_dialog(title: &'static str, default_name: &'static str) -> Task<Option<PathBuf>> {
    Task::perform(
        async move {
            rfd::AsyncFileDialog::new()
                .set_title(title)
                .set_file_name(default_name)
                .save_file()
                .await
                .map(|h| h.path().to_path_buf())
        },
        |path| path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_list_is_capped() {
        let mut live = LiveView::default();
        for i in 0..MAX_DETAIL_LINES + 5 {
            live.push_detail(format!("Frame {i}"));
        }
        assert_eq!(live.details.len(), MAX_DETAIL_LINES);
        assert_eq!(live.details.front().map(String::as_str), Some("Frame 5"));
    }

    #[test]
    fn test_busy_states() {
        assert!(RunState::Preparing.is_busy());
        assert!(RunState::Downloading(1, 2).is_busy());
        assert!(RunState::Running.is_busy());
        assert!(RunState::Stopping.is_busy());
        assert!(!RunState::Idle.is_busy());
        assert!(!RunState::Finished.is_busy());
        assert!(!RunState::Error("boom".into()).is_busy());
    }
}
