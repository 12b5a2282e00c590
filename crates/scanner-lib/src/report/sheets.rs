//! Fixed column layouts of the per-type export sheets

use super::metric_cell;
use crate::classifier::metric_names::*;
use crate::models::{attrs, latest_attach_time, AttributeValue, Finding, ResourceType};

/// Where a sheet column takes its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Metric(&'static str),
    Attr(&'static str),
    Tags,
    AttachmentDate,
    Constant(&'static str),
}

/// Sheet name and ordered (header, source) columns for one resource type
#[derive(Debug)]
pub struct SheetLayout {
    pub sheet: &'static str,
    pub columns: &'static [(&'static str, Column)],
}

const EC2: SheetLayout = SheetLayout {
    sheet: "EC2",
    columns: &[
        ("instanceID", Column::Id),
        ("DiskReadOps", Column::Metric(DISK_READ_OPS)),
        ("DiskWriteOps", Column::Metric(DISK_WRITE_OPS)),
        ("CPU_Util", Column::Metric(CPU_UTILIZATION)),
        ("DiskReadBytes", Column::Metric(DISK_READ_BYTES)),
        ("DiskWriteBytes", Column::Metric(DISK_WRITE_BYTES)),
        ("StatusCheckFailed", Column::Metric(STATUS_CHECK_FAILED)),
    ],
};

const VOLUMES: SheetLayout = SheetLayout {
    sheet: "VOLUMES",
    columns: &[
        ("volumeID", Column::Id),
        ("Attachment-date", Column::AttachmentDate),
        ("ReadOps", Column::Metric(VOLUME_READ_OPS)),
        ("WriteOps", Column::Metric(VOLUME_WRITE_OPS)),
        ("IdleTime", Column::Metric(VOLUME_IDLE_TIME)),
        ("BurstBalance", Column::Metric(BURST_BALANCE)),
    ],
};

const RDS: SheetLayout = SheetLayout {
    sheet: "RDS",
    columns: &[
        ("rdsID", Column::Id),
        ("Status", Column::Attr(attrs::STATE)),
        ("ARN", Column::Attr(attrs::ARN)),
        ("Tags", Column::Tags),
        ("DBConnections", Column::Metric(DATABASE_CONNECTIONS)),
        ("ReadLatency", Column::Metric(READ_LATENCY)),
        ("WriteLatency", Column::Metric(WRITE_LATENCY)),
        ("BurstBalance", Column::Metric(BURST_BALANCE)),
        ("FreeableMem", Column::Metric(FREEABLE_MEMORY)),
        ("FreeStorageSpace", Column::Metric(FREE_STORAGE_SPACE)),
        ("cpuSurplus", Column::Metric(CPU_SURPLUS_CREDIT_BALANCE)),
        ("ebsByteBalance", Column::Metric(EBS_BYTE_BALANCE)),
        ("ebsIOBalance", Column::Metric(EBS_IO_BALANCE)),
    ],
};

const EIP: SheetLayout = SheetLayout {
    sheet: "EIP",
    columns: &[("EIP", Column::Id), ("Status", Column::Constant("available"))],
};

const ELB: SheetLayout = SheetLayout {
    sheet: "ELB",
    columns: &[
        ("elbID", Column::Id),
        ("HealthyHostCount", Column::Metric(HEALTHY_HOST_COUNT)),
        ("RequestCount", Column::Metric(REQUEST_COUNT)),
    ],
};

/// Trailing columns shared by every sheet
const VERDICT_COLUMNS: [&str; 2] = ["Verdict", "Reason"];

impl SheetLayout {
    pub fn for_type(resource_type: ResourceType) -> &'static SheetLayout {
        match resource_type {
            ResourceType::Ec2 => &EC2,
            ResourceType::EbsVolume => &VOLUMES,
            ResourceType::Elb => &ELB,
            ResourceType::Eip => &EIP,
            ResourceType::Rds => &RDS,
        }
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|(header, _)| *header)
            .chain(VERDICT_COLUMNS)
            .collect()
    }

    pub fn row(&self, finding: &Finding) -> Vec<String> {
        self.columns
            .iter()
            .map(|(_, column)| cell(finding, *column))
            .chain([finding.verdict.to_string(), finding.reason_code.clone()])
            .collect()
    }
}

fn cell(finding: &Finding, column: Column) -> String {
    match column {
        Column::Id => finding.resource_id.clone(),
        Column::Metric(name) => metric_cell(&finding.metrics, name),
        Column::Attr(key) => finding.text(key).unwrap_or_default().to_string(),
        Column::Tags => match finding.attributes.get(attrs::TAGS) {
            Some(AttributeValue::Tags(tags)) => tags
                .iter()
                .map(|t| format!("{}={}", t.key, t.value))
                .collect::<Vec<_>>()
                .join(";"),
            _ => String::new(),
        },
        Column::AttachmentDate => latest_attach_time(&finding.attributes)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
        Column::Constant(value) => value.to_string(),
    }
}

/// File name of a type's sheet inside the output directory
pub fn sheet_file_name(resource_type: ResourceType) -> String {
    format!("orphaned_resources_{}.csv", SheetLayout::for_type(resource_type).sheet)
}
