use crate::capture::OutputSink;
use crate::common::Frame;
use crate::error::DeliveryError;
use crate::pipeline::Verdict;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use tracing::info;
use uuid::Uuid;

#[derive(Serialize)]
struct DeliveryRecord<'a> {
    frame_id: Uuid,
    width: u32,
    height: u32,
    captured_at: DateTime<Utc>,
    verdict: &'a Verdict,
}

/// Writes one JSON line per verdict. The binary points it at stdout.
pub struct JsonSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> OutputSink for JsonSink<W> {
    fn deliver(&mut self, frame: &Frame, verdict: &Verdict) -> Result<(), DeliveryError> {
        if verdict.frame_id() != frame.id() {
            return Err(DeliveryError::Rejected(format!(
                "verdict for frame {} delivered with frame {}",
                verdict.frame_id(),
                frame.id()
            )));
        }
        let record = DeliveryRecord {
            frame_id: frame.id(),
            width: frame.width(),
            height: frame.height(),
            captured_at: frame.captured_at(),
            verdict,
        };
        let line = serde_json::to_string(&record)?;
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;

        info!(
            "Delivered frame {}: {:?} ({:?} confidence)",
            frame.id(),
            verdict.overall_condition(),
            verdict.confidence()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::pipeline::ClassificationAggregator;
    use image::{DynamicImage, ImageBuffer, Rgb};

    #[test]
    fn writes_one_json_line_per_verdict() {
        let frame = Frame::new(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            20,
            20,
            Rgb([40, 40, 40]),
        )));
        let verdict = ClassificationAggregator::from_config(&AnalysisConfig::default())
            .unwrap()
            .analyze(&frame);

        let mut sink = JsonSink::new(Vec::new());
        sink.deliver(&frame, &verdict).unwrap();
        sink.deliver(&frame, &verdict).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["frame_id"], frame.id().to_string());
        assert_eq!(record["width"], 20);
        assert_eq!(
            record["verdict"]["overall_condition"],
            format!("{:?}", verdict.overall_condition())
        );
    }

    #[test]
    fn verdict_for_another_frame_is_rejected() {
        let analyzed = Frame::new(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            4,
            4,
            Rgb([10, 10, 10]),
        )));
        let other = Frame::new(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            4,
            4,
            Rgb([10, 10, 10]),
        )));
        let verdict = ClassificationAggregator::from_config(&AnalysisConfig::default())
            .unwrap()
            .analyze(&analyzed);

        let mut sink = JsonSink::new(Vec::new());
        assert!(matches!(
            sink.deliver(&other, &verdict),
            Err(DeliveryError::Rejected(_))
        ));
        assert!(sink.into_inner().is_empty());
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_a_delivery_error() {
        let frame = Frame::new(DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            4,
            4,
            Rgb([0, 0, 0]),
        )));
        let verdict = ClassificationAggregator::from_config(&AnalysisConfig::default())
            .unwrap()
            .analyze(&frame);
        let mut sink = JsonSink::new(BrokenPipe);
        assert!(matches!(
            sink.deliver(&frame, &verdict),
            Err(DeliveryError::Unreachable(_))
        ));
    }
}
