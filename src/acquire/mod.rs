use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod captions;
pub mod download;
pub mod encode;

pub use captions::{youtube_video_id, CaptionTrack, YtDlpCaptions};
pub use download::{DownloadStrategy, YtDlpDownloader};
pub use encode::{EncodeProfile, FfmpegEncoder};

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::pipeline::StopSignal;
use crate::transcribe::{self, SpeechToText};
use crate::transcript::{AcquisitionMethod, Transcript};
use crate::utils;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" | "mp4" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "opus" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

/// Source of pre-existing captions
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch the best caption track for `video_id`, preferring `preferred_langs`
    async fn fetch_captions(&self, video_id: &str, preferred_langs: &[String])
        -> Result<CaptionTrack>;
}

/// Downloads the audio stream of a video into a directory
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// Download with one strategy, returning the produced audio file
    async fn download(
        &self,
        url: &str,
        strategy: &DownloadStrategy,
        dir: &Path,
    ) -> anyhow::Result<PathBuf>;
}

/// Re-encodes audio to a smaller transcription-friendly format
#[async_trait]
pub trait AudioEncoder: Send + Sync {
    async fn reencode(&self, input: &Path, output: &Path, profile: &EncodeProfile)
        -> anyhow::Result<()>;
}

/// Anything that can turn a video URL into a transcript
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn acquire(&self, url: &str) -> Result<Transcript>;
}

/// Knobs for the acquisition flow
#[derive(Debug, Clone)]
pub struct AcquirerSettings {
    pub caption_languages: Vec<String>,
    pub strategies: Vec<DownloadStrategy>,
    pub encode_profile: EncodeProfile,
    pub caption_timeout: Duration,
    pub download_timeout: Duration,
    pub encode_timeout: Duration,
    pub transcription_timeout: Duration,
    pub temp_dir: Option<PathBuf>,
}

impl AcquirerSettings {
    pub fn from_config(config: &Config) -> Self {
        let acquisition = &config.acquisition;
        Self {
            caption_languages: acquisition.caption_languages.clone(),
            strategies: acquisition.strategies.clone(),
            encode_profile: EncodeProfile::from_config(&config.transcription),
            caption_timeout: acquisition.caption_timeout(),
            download_timeout: acquisition.download_timeout(),
            encode_timeout: acquisition.encode_timeout(),
            transcription_timeout: acquisition.transcription_timeout(),
            temp_dir: acquisition.temp_dir.clone(),
        }
    }
}

/// Obtains transcripts from captions, falling back to audio download and
/// speech-to-text
pub struct Acquirer {
    captions: Arc<dyn CaptionSource>,
    downloader: Arc<dyn AudioDownloader>,
    encoder: Arc<dyn AudioEncoder>,
    stt: Arc<dyn SpeechToText>,
    settings: AcquirerSettings,
    stop: StopSignal,
}

impl Acquirer {
    pub fn new(
        captions: Arc<dyn CaptionSource>,
        downloader: Arc<dyn AudioDownloader>,
        encoder: Arc<dyn AudioEncoder>,
        stt: Arc<dyn SpeechToText>,
        settings: AcquirerSettings,
    ) -> Self {
        Self {
            captions,
            downloader,
            encoder,
            stt,
            settings,
            stop: StopSignal::new(),
        }
    }

    /// Build an acquirer backed by yt-dlp, ffmpeg and the configured
    /// speech-to-text backend
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let acquisition = &config.acquisition;
        let stt = transcribe::build_backend(&config.transcription).await?;

        Ok(Self::new(
            Arc::new(YtDlpCaptions::new(&acquisition.yt_dlp_path)?),
            Arc::new(YtDlpDownloader::new(&acquisition.yt_dlp_path)),
            Arc::new(FfmpegEncoder::new(&acquisition.ffmpeg_path)),
            stt,
            AcquirerSettings::from_config(config),
        ))
    }

    /// Share a stop signal checked between download strategies
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Acquire a transcript for `url`.
    ///
    /// Captions are tried first when a video id can be resolved; any caption
    /// failure falls through to the audio path. URLs that are not valid
    /// http(s) URLs fail immediately.
    pub async fn acquire(&self, url: &str) -> Result<Transcript> {
        let parsed = utils::validate_and_normalize_url(url)
            .map_err(|e| PipelineError::InvalidUrl(format!("{}: {:#}", url, e)))?;

        match youtube_video_id(&parsed) {
            Some(video_id) => match self.acquire_captions(&video_id).await {
                Ok(transcript) => return Ok(transcript),
                Err(e) => tracing::warn!("Caption acquisition failed, falling back to audio: {}", e),
            },
            None => tracing::info!("No YouTube video id in {}, skipping captions", url),
        }

        self.stop.check()?;
        self.acquire_audio(url).await
    }

    async fn acquire_captions(&self, video_id: &str) -> Result<Transcript> {
        tracing::info!("Fetching captions for video {}", video_id);

        let track = with_timeout(
            self.settings.caption_timeout,
            self.captions
                .fetch_captions(video_id, &self.settings.caption_languages),
        )
        .await
        .unwrap_or_else(|| {
            Err(PipelineError::NoCaptionsAvailable {
                video_id: video_id.to_string(),
                reason: format!("timed out after {:?}", self.settings.caption_timeout),
            })
        })?;

        let language = track.language.clone();
        let transcript = Transcript::from_segments(track.segments, AcquisitionMethod::Captions)
            .ok_or_else(|| PipelineError::NoCaptionsAvailable {
                video_id: video_id.to_string(),
                reason: "caption track is empty".to_string(),
            })?
            .with_language(Some(language));

        tracing::info!(
            "Captions acquired: {} segments, {} words",
            transcript.segments().len(),
            transcript.word_count()
        );
        Ok(transcript)
    }

    async fn acquire_audio(&self, url: &str) -> Result<Transcript> {
        let scratch = self.scratch_dir()?;
        let scratch_path = scratch.path().to_path_buf();

        let result = self.transcribe_audio(url, &scratch_path).await;

        if let Err(e) = scratch.close() {
            tracing::warn!(
                "Failed to remove scratch directory {}: {}",
                scratch_path.display(),
                e
            );
        }

        result
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("clipnotes-");

        let created = match &self.settings.temp_dir {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };

        created.map_err(|e| {
            PipelineError::TranscriptionError(format!("could not create scratch directory: {}", e))
        })
    }

    async fn transcribe_audio(&self, url: &str, dir: &Path) -> Result<Transcript> {
        let audio_path = self.download_with_fallbacks(url, dir).await?;

        let compressed = dir.join("compressed.mp3");
        let reencoded = with_timeout(
            self.settings.encode_timeout,
            self.encoder
                .reencode(&audio_path, &compressed, &self.settings.encode_profile),
        )
        .await
        .unwrap_or_else(|| {
            Err(anyhow::anyhow!(
                "timed out after {:?}",
                self.settings.encode_timeout
            ))
        });

        let input = match reencoded {
            Ok(()) => {
                tracing::info!(
                    "Compressed audio: {} -> {}",
                    file_size(&audio_path),
                    file_size(&compressed)
                );
                compressed
            }
            Err(e) => {
                let err = PipelineError::CompressionFailed(format!("{:#}", e));
                tracing::warn!("{}; transcribing original audio", err);
                audio_path
            }
        };

        self.stop.check()?;
        tracing::info!("Transcribing {}", input.display());

        let speech = with_timeout(self.settings.transcription_timeout, self.stt.transcribe(&input))
            .await
            .unwrap_or_else(|| {
                Err(anyhow::anyhow!(
                    "timed out after {:?}",
                    self.settings.transcription_timeout
                ))
            })
            .map_err(|e| PipelineError::TranscriptionError(format!("{:#}", e)))?;

        let transcript = Transcript::from_segments(speech.segments, AcquisitionMethod::SpeechToText)
            .ok_or_else(|| {
                PipelineError::TranscriptionError("no speech detected in audio".to_string())
            })?
            .with_language(speech.language);

        tracing::info!(
            "Transcription complete: {} segments, {} words",
            transcript.segments().len(),
            transcript.word_count()
        );
        Ok(transcript)
    }

    /// Try each strategy in order until one produces an audio file
    async fn download_with_fallbacks(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let strategies = &self.settings.strategies;
        let mut last_error = "no download strategies configured".to_string();

        for (i, strategy) in strategies.iter().enumerate() {
            self.stop.check()?;
            tracing::info!(
                "Downloading audio (strategy {}/{}: {})",
                i + 1,
                strategies.len(),
                strategy.name
            );

            let attempt = with_timeout(
                self.settings.download_timeout,
                self.downloader.download(url, strategy, dir),
            )
            .await
            .unwrap_or_else(|| {
                Err(anyhow::anyhow!(
                    "timed out after {:?}",
                    self.settings.download_timeout
                ))
            });

            match attempt {
                Ok(path) => {
                    tracing::info!(
                        "Downloaded {} ({}) with strategy {}",
                        path.display(),
                        file_size(&path),
                        strategy.name
                    );
                    return Ok(path);
                }
                Err(e) => {
                    tracing::warn!("Download strategy {} failed: {:#}", strategy.name, e);
                    last_error = format!("{}: {:#}", strategy.name, e);
                }
            }
        }

        Err(PipelineError::DownloadFailed {
            attempts: strategies.len(),
            last_error,
        })
    }
}

#[async_trait]
impl TranscriptSource for Acquirer {
    async fn acquire(&self, url: &str) -> Result<Transcript> {
        Acquirer::acquire(self, url).await
    }
}

/// Run `fut` with a deadline; `None` means it timed out and was dropped
async fn with_timeout<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}

fn file_size(path: &Path) -> String {
    std::fs::metadata(path)
        .map(|m| utils::format_file_size(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transcribe::SpeechTranscript;
    use crate::transcript::TranscriptSegment;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct NoCaptions;

    #[async_trait]
    impl CaptionSource for NoCaptions {
        async fn fetch_captions(&self, video_id: &str, _: &[String]) -> Result<CaptionTrack> {
            Err(PipelineError::NoCaptionsAvailable {
                video_id: video_id.to_string(),
                reason: "no tracks".to_string(),
            })
        }
    }

    struct FixedCaptions;

    #[async_trait]
    impl CaptionSource for FixedCaptions {
        async fn fetch_captions(&self, _: &str, langs: &[String]) -> Result<CaptionTrack> {
            assert_eq!(langs[0], "en");
            Ok(CaptionTrack {
                language: "en".to_string(),
                automatic: false,
                segments: vec![
                    TranscriptSegment::new(0.0, "from"),
                    TranscriptSegment::new(1.5, "captions"),
                ],
            })
        }
    }

    /// Succeeds on the `succeed_on`-th call (1-based), records every strategy
    struct ScriptedDownloader {
        succeed_on: Option<usize>,
        calls: Mutex<Vec<String>>,
        dirs: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedDownloader {
        fn new(succeed_on: Option<usize>) -> Self {
            Self {
                succeed_on,
                calls: Mutex::new(Vec::new()),
                dirs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AudioDownloader for ScriptedDownloader {
        async fn download(
            &self,
            _url: &str,
            strategy: &DownloadStrategy,
            dir: &Path,
        ) -> anyhow::Result<PathBuf> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(strategy.name.clone());
            self.dirs.lock().unwrap().push(dir.to_path_buf());
            if Some(calls.len()) == self.succeed_on {
                let path = dir.join("audio.mp3");
                std::fs::write(&path, b"fake audio")?;
                Ok(path)
            } else {
                anyhow::bail!("HTTP Error 403: Forbidden")
            }
        }
    }

    struct BrokenEncoder;

    #[async_trait]
    impl AudioEncoder for BrokenEncoder {
        async fn reencode(&self, _: &Path, _: &Path, _: &EncodeProfile) -> anyhow::Result<()> {
            anyhow::bail!("ffmpeg: not found")
        }
    }

    struct CopyEncoder;

    #[async_trait]
    impl AudioEncoder for CopyEncoder {
        async fn reencode(&self, input: &Path, output: &Path, _: &EncodeProfile) -> anyhow::Result<()> {
            std::fs::copy(input, output)?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingStt {
        inputs: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    #[async_trait]
    impl SpeechToText for RecordingStt {
        async fn transcribe(&self, audio: &Path) -> anyhow::Result<SpeechTranscript> {
            assert!(audio.exists(), "audio must exist while transcribing");
            self.inputs.lock().unwrap().push(audio.to_path_buf());
            if self.fail {
                anyhow::bail!("HTTP 413: file too large");
            }
            Ok(SpeechTranscript {
                language: Some("english".to_string()),
                segments: vec![
                    TranscriptSegment::new(0.0, " Spoken "),
                    TranscriptSegment::new(2.0, "words."),
                ],
            })
        }
    }

    fn strategies(n: usize) -> Vec<DownloadStrategy> {
        (1..=n)
            .map(|i| DownloadStrategy::named(&format!("strategy-{}", i)))
            .collect()
    }

    fn settings(n: usize) -> AcquirerSettings {
        AcquirerSettings {
            caption_languages: vec!["en".to_string()],
            strategies: strategies(n),
            encode_profile: EncodeProfile::default(),
            caption_timeout: Duration::from_secs(5),
            download_timeout: Duration::from_secs(5),
            encode_timeout: Duration::from_secs(5),
            transcription_timeout: Duration::from_secs(5),
            temp_dir: None,
        }
    }

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[tokio::test]
    async fn test_captions_win_when_available() {
        let downloader = Arc::new(ScriptedDownloader::new(Some(1)));
        let acquirer = Acquirer::new(
            Arc::new(FixedCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt::default()),
            settings(3),
        );

        let transcript = acquirer.acquire(URL).await.unwrap();
        assert_eq!(transcript.method(), AcquisitionMethod::Captions);
        assert_eq!(transcript.full_text(), "from captions");
        assert_eq!(transcript.language(), Some("en"));
        assert!(downloader.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_third_of_five_strategies_succeeds() {
        let downloader = Arc::new(ScriptedDownloader::new(Some(3)));
        let stt = Arc::new(RecordingStt::default());
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            stt.clone(),
            settings(5),
        );

        let transcript = acquirer.acquire(URL).await.unwrap();
        assert_eq!(transcript.method(), AcquisitionMethod::SpeechToText);
        assert_eq!(transcript.full_text(), "Spoken words.");
        assert_eq!(
            *downloader.calls.lock().unwrap(),
            vec!["strategy-1", "strategy-2", "strategy-3"]
        );

        let inputs = stt.inputs.lock().unwrap();
        assert!(inputs[0].ends_with("compressed.mp3"));

        let dir = downloader.dirs.lock().unwrap()[0].clone();
        assert!(!dir.exists(), "scratch directory should be removed");
    }

    #[tokio::test]
    async fn test_compression_failure_uses_original_audio() {
        let stt = Arc::new(RecordingStt::default());
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            Arc::new(ScriptedDownloader::new(Some(1))),
            Arc::new(BrokenEncoder),
            stt.clone(),
            settings(2),
        );

        acquirer.acquire(URL).await.unwrap();
        assert!(stt.inputs.lock().unwrap()[0].ends_with("audio.mp3"));
    }

    #[tokio::test]
    async fn test_all_strategies_exhausted() {
        let downloader = Arc::new(ScriptedDownloader::new(None));
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt::default()),
            settings(8),
        );

        let err = acquirer.acquire(URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
        assert_eq!(downloader.calls.lock().unwrap().len(), 8);
        match err {
            PipelineError::DownloadFailed { attempts, last_error } => {
                assert_eq!(attempts, 8);
                assert!(last_error.starts_with("strategy-8"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transcription_failure_still_cleans_up() {
        let downloader = Arc::new(ScriptedDownloader::new(Some(1)));
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt {
                fail: true,
                ..Default::default()
            }),
            settings(1),
        );

        let err = acquirer.acquire(URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptionError);
        assert!(err.to_string().contains("file too large"));
        assert!(!downloader.dirs.lock().unwrap()[0].exists());
    }

    #[tokio::test]
    async fn test_invalid_url_fails_fast() {
        let downloader = Arc::new(ScriptedDownloader::new(Some(1)));
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt::default()),
            settings(1),
        );

        let err = acquirer.acquire("not a url").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
        assert!(downloader.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stop_signal_aborts_between_strategies() {
        let stop = StopSignal::new();
        stop.raise();
        let downloader = Arc::new(ScriptedDownloader::new(Some(2)));
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt::default()),
            settings(3),
        )
        .with_stop_signal(stop);

        let err = acquirer.acquire(URL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(downloader.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_strategy_times_out() {
        struct Hanging(AtomicUsize);

        #[async_trait]
        impl AudioDownloader for Hanging {
            async fn download(&self, _: &str, _: &DownloadStrategy, dir: &Path) -> anyhow::Result<PathBuf> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                let path = dir.join("audio.m4a");
                std::fs::write(&path, b"late audio")?;
                Ok(path)
            }
        }

        let downloader = Arc::new(Hanging(AtomicUsize::new(0)));
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt::default()),
            settings(2),
        );

        let transcript = acquirer.acquire(URL).await.unwrap();
        assert_eq!(transcript.method(), AcquisitionMethod::SpeechToText);
        assert_eq!(downloader.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_transcription_times_out() {
        struct QueuedForever;

        #[async_trait]
        impl SpeechToText for QueuedForever {
            async fn transcribe(&self, _: &Path) -> anyhow::Result<SpeechTranscript> {
                tokio::time::sleep(Duration::from_secs(10 * 24 * 3600)).await;
                anyhow::bail!("job never finished")
            }
        }

        let downloader = Arc::new(ScriptedDownloader::new(Some(1)));
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(QueuedForever),
            settings(1),
        );

        let outcome =
            tokio::time::timeout(Duration::from_secs(3600), acquirer.acquire(URL)).await;
        let err = outcome.expect("acquire should give up on its own").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptionError);
        assert!(err.to_string().contains("timed out"));
        assert!(!downloader.dirs.lock().unwrap()[0].exists());
    }

    #[tokio::test]
    async fn test_url_without_video_id_skips_captions() {
        #[derive(Default)]
        struct CountingCaptions(AtomicUsize);

        #[async_trait]
        impl CaptionSource for CountingCaptions {
            async fn fetch_captions(&self, video_id: &str, _: &[String]) -> Result<CaptionTrack> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::NoCaptionsAvailable {
                    video_id: video_id.to_string(),
                    reason: "no tracks".to_string(),
                })
            }
        }

        let captions = Arc::new(CountingCaptions::default());
        let downloader = Arc::new(ScriptedDownloader::new(Some(1)));
        let acquirer = Acquirer::new(
            captions.clone(),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt::default()),
            settings(2),
        );

        let transcript = acquirer.acquire("https://vimeo.com/123").await.unwrap();
        assert_eq!(transcript.method(), AcquisitionMethod::SpeechToText);
        assert_eq!(captions.0.load(Ordering::SeqCst), 0);
        assert_eq!(*downloader.calls.lock().unwrap(), vec!["strategy-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caption_timeout_falls_back_to_audio() {
        struct HangingCaptions;

        #[async_trait]
        impl CaptionSource for HangingCaptions {
            async fn fetch_captions(&self, _: &str, _: &[String]) -> Result<CaptionTrack> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(CaptionTrack {
                    language: "en".to_string(),
                    automatic: false,
                    segments: vec![TranscriptSegment::new(0.0, "too late")],
                })
            }
        }

        let downloader = Arc::new(ScriptedDownloader::new(Some(1)));
        let acquirer = Acquirer::new(
            Arc::new(HangingCaptions),
            downloader.clone(),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt::default()),
            settings(1),
        );

        let transcript = acquirer.acquire(URL).await.unwrap();
        assert_eq!(transcript.method(), AcquisitionMethod::SpeechToText);
        assert_eq!(transcript.full_text(), "Spoken words.");
        assert_eq!(downloader.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_scratch_dir_failure_is_not_a_download_failure() {
        let missing = tempfile::tempdir().unwrap().path().join("gone");
        let mut settings = settings(1);
        settings.temp_dir = Some(missing);
        let acquirer = Acquirer::new(
            Arc::new(NoCaptions),
            Arc::new(ScriptedDownloader::new(Some(1))),
            Arc::new(CopyEncoder),
            Arc::new(RecordingStt::default()),
            settings,
        );

        let err = acquirer.scratch_dir().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptionError);
        assert!(err.to_string().contains("scratch directory"));
    }

    #[test]
    fn test_audio_format_from_path() {
        assert_eq!(AudioFormat::from_path(Path::new("a/audio.opus")), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::from_path(Path::new("audio.MP3")), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_path(Path::new("audio.part")), None);
        assert_eq!(AudioFormat::M4a.mime_type(), "audio/mp4");
    }
}
