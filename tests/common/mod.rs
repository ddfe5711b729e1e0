#![allow(dead_code)]

use anyhow::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

pub const DBR_HEADER: &str = "InvoiceID,PayerAccountId,LinkedAccountId,RecordType,RecordId,ProductName,RateId,SubscriptionId,PricingPlanId,UsageType,Operation,AvailabilityZone,ReservedInstance,ItemDescription,UsageStartDate,UsageEndDate,UsageQuantity,BlendedRate,BlendedCost,UnBlendedRate,UnBlendedCost,ResourceId";

/// One DBR line item, with just the columns the analysis reads filled in
pub struct DbrLine {
    pub usage_type: String,
    pub operation: String,
    pub reserved: bool,
    pub description: String,
    pub start: String,
    pub end: String,
    pub quantity: f64,
    pub resource_id: String,
}

impl DbrLine {
    pub fn ec2(usage_type: &str, operation: &str, start: &str, end: &str) -> Self {
        Self {
            usage_type: usage_type.to_string(),
            operation: operation.to_string(),
            reserved: false,
            description: "CNY 1.0 per On Demand instance hour".to_string(),
            start: start.to_string(),
            end: end.to_string(),
            quantity: 1.0,
            resource_id: "i-0000".to_string(),
        }
    }

    pub fn reserved(mut self, model: &str, platform: &str) -> Self {
        self.reserved = true;
        self.description = format!(
            "CNY 0.0 per {} (Amazon VPC), {} reserved instance applied",
            platform, model
        );
        self
    }

    pub fn quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn resource(mut self, id: &str) -> Self {
        self.resource_id = id.to_string();
        self
    }

    fn to_csv(&self) -> String {
        format!(
            "94,1111,2222,LineItem,1,Amazon Elastic Compute Cloud,1,1,1,{},{},cn-north-1a,{},\"{}\",{},{},{:.8},0,0,0,0,{}",
            self.usage_type,
            self.operation,
            if self.reserved { "Y" } else { "N" },
            self.description,
            self.start,
            self.end,
            self.quantity,
            self.resource_id
        )
    }
}

pub fn dbr_csv(lines: &[DbrLine]) -> String {
    let mut csv = String::from(DBR_HEADER);
    csv.push('\n');
    for line in lines {
        csv.push_str(&line.to_csv());
        csv.push('\n');
    }
    // Storage rows and the invoice total are always present in real exports
    csv.push_str("94,1111,2222,LineItem,2,Amazon Simple Storage Service,1,1,1,CNN1-TimedStorage-ByteHrs,StandardStorage,,N,CNY 0.0 per GB,2018-12-24 08:00:00,2018-12-24 09:00:00,0.5,0,0,0,0,bucket\n");
    csv.push_str("94,1111,,InvoiceTotal,,,,,,,,,,Total amount for invoice 94,,,,,,,,\n");
    csv
}

pub fn write_dbr_zip(dir: &Path, lines: &[DbrLine]) -> Result<PathBuf> {
    let path = dir.join("1111-aws-billing-detailed-line-items-with-resources-and-tags-2018-12.csv.zip");
    let mut zip = zip::ZipWriter::new(File::create(&path)?);
    zip.start_file(
        "1111-aws-billing-detailed-line-items-with-resources-and-tags-2018-12.csv",
        SimpleFileOptions::default(),
    )?;
    zip.write_all(dbr_csv(lines).as_bytes())?;
    zip.finish()?;
    Ok(path)
}

pub struct RiEntry<'a> {
    pub id: &'a str,
    pub start: &'a str,
    pub end: &'a str,
    pub instance_type: &'a str,
    pub platform: &'a str,
    pub count: u32,
}

pub fn write_snapshot(dir: &Path, entries: &[RiEntry<'_>]) -> Result<PathBuf> {
    let reserved: Vec<_> = entries
        .iter()
        .map(|e| {
            serde_json::json!({
                "ReservedInstancesId": e.id,
                "Start": e.start,
                "End": e.end,
                "InstanceType": e.instance_type,
                "ProductDescription": e.platform,
                "InstanceCount": e.count,
                "State": "retired",
                "OfferingType": "All Upfront",
                "Scope": "Region"
            })
        })
        .collect();
    let path = dir.join("ri-subscriptions.json");
    fs::write(
        &path,
        serde_json::to_string_pretty(&serde_json::json!({ "ReservedInstances": reserved }))?,
    )?;
    Ok(path)
}

/// A Linux/UNIX c4.xlarge reservation active for a year from 2018-12-24T00:00Z
pub fn linux_c4_xlarge(count: u32) -> RiEntry<'static> {
    RiEntry {
        id: "ri-linux-c4",
        start: "2018-12-24T00:00:00.000Z",
        end: "2019-12-24T00:00:00.000Z",
        instance_type: "c4.xlarge",
        platform: "Linux/UNIX",
        count,
    }
}

pub const HOUR_START: &str = "2018-12-24 08:00:00";
pub const HOUR_END: &str = "2018-12-24 09:00:00";
