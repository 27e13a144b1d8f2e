use super::EventHandlers;
use crate::error::Result;
use crate::event::{Event, JobCompletion};
use crate::media::UpdateVideoMetadataCommand;
use crate::pipeline::steps;

impl EventHandlers {
    /// Store the probe results. Transcoding is requested separately through
    /// [`EventHandlers::request_transcode`].
    ///
    /// A failed analysis changes nothing, unlike a failed transcode.
    pub(crate) async fn on_analyze_completed(
        &self,
        trigger: &Event,
        completion: JobCompletion,
    ) -> Result<()> {
        let asset_id = completion.asset_id.as_str();
        let video_id = completion.video_id.as_str();

        if !completion.success {
            tracing::warn!(
                asset_id,
                video_id,
                event_id = %trigger.id,
                error = %completion.error_message(),
                "analysis failed, nothing recorded"
            );
            return Ok(());
        }

        self.media
            .update_video_metadata(UpdateVideoMetadataCommand::from(&completion))
            .await?;
        self.pipeline
            .mark_completed(asset_id, video_id, steps::ANALYZE)
            .await?;

        tracing::info!(asset_id, video_id, "analysis recorded");
        Ok(())
    }
}
