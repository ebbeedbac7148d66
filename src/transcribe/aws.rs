use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_transcribe::types::{LanguageCode, Media, MediaFormat};
use aws_sdk_transcribe::Client as TranscribeClient;
use aws_types::region::Region;
use std::path::Path;
use uuid::Uuid;

use super::processor::TranscriptionProcessor;
use super::{SpeechToText, SpeechTranscript};
use crate::acquire::AudioFormat;
use crate::config::{AwsConfig, TranscriptionConfig};

/// Speech-to-text via AWS Transcribe, staging audio in S3
pub struct AwsTranscriber {
    s3_client: S3Client,
    transcribe_client: TranscribeClient,
    aws: AwsConfig,
    language: Option<String>,
}

impl AwsTranscriber {
    pub async fn new(config: &TranscriptionConfig) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.aws.region.clone()))
            .load()
            .await;

        Self {
            s3_client: S3Client::new(&aws_config),
            transcribe_client: TranscribeClient::new(&aws_config),
            aws: config.aws.clone(),
            language: config.language.clone(),
        }
    }

    /// Upload audio file to S3
    async fn upload_to_s3(&self, audio: &Path, format: AudioFormat) -> Result<String> {
        let key = format!(
            "{}audio_{}_{}.{}",
            self.aws.s3_key_prefix.as_deref().unwrap_or(""),
            Uuid::new_v4(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            format.as_str()
        );

        tracing::info!("Uploading audio to S3: s3://{}/{}", self.aws.s3_bucket, key);

        let content = fs_err::read(audio)?;

        self.s3_client
            .put_object()
            .bucket(&self.aws.s3_bucket)
            .key(&key)
            .body(content.into())
            .content_type(format.mime_type())
            .send()
            .await
            .context("Failed to upload audio to S3")?;

        Ok(key)
    }

    async fn start_job(&self, s3_key: &str, format: AudioFormat) -> Result<String> {
        let job_name = format!("clipnotes_{}", Uuid::new_v4());
        let media_uri = format!("s3://{}/{}", self.aws.s3_bucket, s3_key);

        tracing::info!("Starting transcription job: {}", job_name);

        let media = Media::builder().media_file_uri(media_uri).build();

        let mut job = self
            .transcribe_client
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .media_format(media_format(format))
            .media(media);

        job = match self.language.as_deref() {
            Some(lang) => job.language_code(LanguageCode::from(lang)),
            None => job.identify_language(true),
        };

        job.send()
            .await
            .context("Failed to start transcription job")?;

        Ok(job_name)
    }

    fn staged(&self, key: String) -> StagedObject {
        StagedObject {
            client: self.s3_client.clone(),
            bucket: self.aws.s3_bucket.clone(),
            key,
        }
    }
}

/// An uploaded S3 object, deleted in the background when dropped
///
/// Dropping covers early returns and a transcription call abandoned on timeout.
struct StagedObject {
    client: S3Client,
    bucket: String,
    key: String,
}

impl Drop for StagedObject {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No runtime to clean up S3 object {}", self.key);
            return;
        };

        let client = self.client.clone();
        let bucket = std::mem::take(&mut self.bucket);
        let key = std::mem::take(&mut self.key);
        runtime.spawn(async move {
            tracing::debug!("Cleaning up S3 object: {}", key);
            let deleted = client.delete_object().bucket(&bucket).key(&key).send().await;
            if let Err(e) = deleted {
                tracing::warn!("Failed to clean up S3 object {}: {}", key, e);
            }
        });
    }
}

#[async_trait]
impl SpeechToText for AwsTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<SpeechTranscript> {
        let format = AudioFormat::from_path(audio).unwrap_or(AudioFormat::Mp3);
        let staged = self.staged(self.upload_to_s3(audio, format).await?);

        let job_name = self.start_job(&staged.key, format).await?;
        TranscriptionProcessor::new(
            self.transcribe_client.clone(),
            job_name,
            self.aws.max_segment_length,
        )
        .wait_for_completion()
        .await
    }
}

fn media_format(format: AudioFormat) -> MediaFormat {
    match format {
        AudioFormat::Mp3 => MediaFormat::Mp3,
        AudioFormat::M4a => MediaFormat::Mp4,
        AudioFormat::Wav => MediaFormat::Wav,
        AudioFormat::Flac => MediaFormat::Flac,
        AudioFormat::Ogg => MediaFormat::Ogg,
        AudioFormat::Webm => MediaFormat::Webm,
    }
}
