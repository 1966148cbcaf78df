use super::{instance_id, InstanceSpec, VmSettings};
use owo_colors::OwoColorize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path;

// Error Handling
use civirt_error::{CivirtError, ConfigError};
use log::{debug, info};
use miette::Result;

/// Keys every `[[vms]]` entry must carry itself, with their accepted aliases.
const VM_REQUIRED: [(&str, &[&str]); 2] = [("fqdn", &[]), ("address", &["ipaddr"])];
/// Keys the merged settings must carry, from `[common]` or the vm entry.
const MERGED_REQUIRED: [(&str, &[&str]); 2] =
    [("backing_disk", &["backingdisk"]), ("directory", &[])];

/*
* Compile a raw configuration document into one InstanceSpec per vm,
* in document order.
* Any invalid entry fails the whole batch.
*/
pub fn compile(document: &Value) -> Result<Vec<InstanceSpec>, CivirtError> {
    let common = common_settings(document)?;
    let vms = match document.get("vms") {
        Some(Value::Array(vms)) => vms,
        Some(_) => {
            let err = ConfigError::invalid("`vms` must be a list of tables", "Use [[vms]] entries.");
            return Err(err.into());
        }
        None => {
            let err = ConfigError::invalid(
                "Missing `vms` in configuration",
                "Declare at least one [[vms]] entry with a fqdn and an address.",
            );
            return Err(err.into());
        }
    };

    let mut seen = HashSet::new();
    let mut specs = vec![];
    for (index, vm) in vms.iter().enumerate() {
        let vm = match vm.as_object() {
            Some(v) => v,
            None => {
                let message = format!("vms[{index}] is not a table");
                return Err(ConfigError::invalid(message, "").into());
            }
        };
        for (key, aliases) in VM_REQUIRED {
            require(vm, key, aliases, &format!("vms[{index}]"))?;
        }
        let spec = resolve(merge(&common, vm), index)?;
        if !seen.insert(spec.fqdn.clone()) {
            let message = format!("Duplicate vm fqdn {:?}", spec.fqdn);
            let help = "Every vm must have its own fqdn.";
            return Err(ConfigError::invalid(message, help).into());
        }
        specs.push(spec);
    }
    Ok(specs)
}

/*
* Compile a single vm out of the `[common]` settings,
* with a fqdn and an address that do not appear in the document.
*/
pub fn compile_instance(
    document: &Value,
    fqdn: &str,
    address: &str,
) -> Result<InstanceSpec, CivirtError> {
    let common = common_settings(document)?;
    let mut vm = Map::new();
    vm.insert("fqdn".to_owned(), Value::String(fqdn.to_owned()));
    vm.insert("address".to_owned(), Value::String(address.to_owned()));
    resolve(merge(&common, &vm), 0)
}

fn common_settings(document: &Value) -> Result<Map<String, Value>, CivirtError> {
    if !document.is_object() {
        let err = ConfigError::invalid(
            "Configuration document is not a table",
            "Expected a [common] table and [[vms]] entries.",
        );
        return Err(err.into());
    }
    match document.get("common") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.to_owned()),
        Some(_) => Err(ConfigError::invalid("`common` must be a table", "").into()),
    }
}

/// Deep copy of the common settings with the vm keys laid over it.
/// Only top level keys are replaced, nested tables are not merged.
pub fn merge(common: &Map<String, Value>, vm: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = common.clone();
    for (key, value) in vm {
        merged.insert(key.to_owned(), value.to_owned());
    }
    merged
}

fn require(
    map: &Map<String, Value>,
    key: &str,
    aliases: &[&str],
    location: &str,
) -> Result<(), ConfigError> {
    let present = std::iter::once(&key)
        .chain(aliases)
        .any(|k| map.get(*k).is_some_and(|v| !v.is_null()));
    if present {
        Ok(())
    } else {
        let message = format!("Missing field `{key}` in {location}");
        let help = match aliases.first() {
            Some(alias) => format!("Set `{key}` (or `{alias}`)."),
            None => format!("Set `{key}`."),
        };
        Err(ConfigError::invalid(message, help))
    }
}

fn resolve(merged: Map<String, Value>, index: usize) -> Result<InstanceSpec, CivirtError> {
    let location = match merged.get("fqdn").and_then(|v| v.as_str()) {
        Some(fqdn) => format!("vm {fqdn}"),
        None => format!("vms[{index}]"),
    };
    for (key, aliases) in MERGED_REQUIRED {
        require(&merged, key, aliases, &location)?;
    }

    let settings: VmSettings = serde_json::from_value(Value::Object(merged)).map_err(|e| {
        ConfigError::invalid(format!("Invalid settings for {location}"), e.to_string())
    })?;

    let directory = path::absolute(&settings.directory).map_err(|e| {
        ConfigError::invalid(
            format!("Invalid directory {:?} for {location}", settings.directory),
            e.to_string(),
        )
    })?;
    let user_data = match settings.user_data {
        Value::Null => Value::Object(Map::new()),
        v => v,
    };

    let spec = InstanceSpec {
        instance_id: instance_id(&settings.fqdn),
        disk_path: directory.join(format!("{}.qcow2", settings.fqdn)),
        cidata_path: directory.join(format!("{}.iso", settings.fqdn)),
        fqdn: settings.fqdn,
        address: settings.address,
        cpu: settings.cpu,
        memory: settings.memory,
        backing_disk: settings.backing_disk,
        size: settings.size,
        directory,
        user_data,
    };
    info!("{} {} -- configuration ready.", "[config]".yellow(), spec.fqdn);
    debug!("{:#?}", spec);
    Ok(spec)
}
