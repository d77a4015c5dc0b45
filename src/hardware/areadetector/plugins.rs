//! areaDetector plugin blocks.
//!
//! Every plugin shares the [`PluginBase`] controls; file writers add the
//! [`FilePlugin`] controls on top.

use crate::channel::ChannelAccess;
use crate::device::{nest, signal_entries, Component, SignalEntry};
use crate::signal::{Kind, Signal, SignalRo, SignalWithRbv};
use std::sync::Arc;

fn rbv(client: &Arc<dyn ChannelAccess>, prefix: &str, suffix: &str) -> SignalWithRbv {
    SignalWithRbv::new(client.clone(), format!("{}{}", prefix, suffix))
}

/// Controls common to all plugins.
#[derive(Debug, Clone)]
pub struct PluginBase {
    prefix: String,
    pub enable: SignalWithRbv,
    pub nd_array_port: SignalWithRbv,
    pub array_counter: SignalWithRbv,
    pub blocking_callbacks: SignalWithRbv,
    pub plugin_type: SignalRo,
}

impl PluginBase {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            enable: rbv(&client, prefix, "EnableCallbacks"),
            nd_array_port: rbv(&client, prefix, "NDArrayPort"),
            array_counter: rbv(&client, prefix, "ArrayCounter").with_kind(Kind::Normal),
            blocking_callbacks: rbv(&client, prefix, "BlockingCallbacks"),
            plugin_type: SignalRo::new(client.clone(), format!("{}PluginType_RBV", prefix))
                .with_kind(Kind::Config),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Component for PluginBase {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        signal_entries!(self; enable, nd_array_port, array_counter, blocking_callbacks, plugin_type)
    }

    fn address(&self) -> &str {
        &self.prefix
    }
}

/// File-writing controls (TIFF, HDF5, ...).
#[derive(Debug, Clone)]
pub struct FilePlugin {
    pub base: PluginBase,
    pub file_path: SignalWithRbv,
    pub file_name: SignalWithRbv,
    pub file_template: SignalWithRbv,
    pub file_number: SignalWithRbv,
    pub auto_increment: SignalWithRbv,
    pub auto_save: SignalWithRbv,
    pub file_write_mode: SignalWithRbv,
    pub num_capture: SignalWithRbv,
    pub capture: SignalWithRbv,
    pub full_file_name: SignalRo,
}

/// TIFF file writer.
pub type TiffPlugin = FilePlugin;

impl FilePlugin {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        Self {
            base: PluginBase::new(client.clone(), prefix),
            file_path: rbv(&client, prefix, "FilePath"),
            file_name: rbv(&client, prefix, "FileName"),
            file_template: rbv(&client, prefix, "FileTemplate"),
            file_number: rbv(&client, prefix, "FileNumber"),
            auto_increment: rbv(&client, prefix, "AutoIncrement"),
            auto_save: rbv(&client, prefix, "AutoSave"),
            file_write_mode: rbv(&client, prefix, "FileWriteMode"),
            num_capture: rbv(&client, prefix, "NumCapture"),
            capture: rbv(&client, prefix, "Capture").with_kind(Kind::Omitted),
            full_file_name: SignalRo::new(client, format!("{}FullFileName_RBV", prefix))
                .with_kind(Kind::Config),
        }
    }
}

impl Component for FilePlugin {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.base.signals();
        entries.extend(signal_entries!(self;
            file_path,
            file_name,
            file_template,
            file_number,
            auto_increment,
            auto_save,
            file_write_mode,
            num_capture,
            capture,
            full_file_name,
        ));
        entries
    }

    fn address(&self) -> &str {
        self.base.prefix()
    }
}

/// HDF5 file writer with the XML layout file used at 6-ID-D.
#[derive(Debug, Clone)]
pub struct Hdf5Plugin {
    pub file: FilePlugin,
    pub xml_file_name: SignalWithRbv,
}

impl Hdf5Plugin {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        Self {
            file: FilePlugin::new(client.clone(), prefix),
            xml_file_name: rbv(&client, prefix, "XMLFileName"),
        }
    }
}

impl Component for Hdf5Plugin {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.file.signals();
        entries.extend(signal_entries!(self; xml_file_name));
        entries
    }

    fn address(&self) -> &str {
        self.file.address()
    }
}

/// Background, flat-field and filter processing.
#[derive(Debug, Clone)]
pub struct ProcessPlugin {
    pub base: PluginBase,
    pub enable_background: SignalWithRbv,
    pub enable_flat_field: SignalWithRbv,
    pub enable_offset_scale: SignalWithRbv,
    pub enable_filter: SignalWithRbv,
    pub filter_type: Signal,
    pub num_filter: SignalWithRbv,
}

impl ProcessPlugin {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        Self {
            base: PluginBase::new(client.clone(), prefix),
            enable_background: rbv(&client, prefix, "EnableBackground"),
            enable_flat_field: rbv(&client, prefix, "EnableFlatField"),
            enable_offset_scale: rbv(&client, prefix, "EnableOffsetScale"),
            enable_filter: rbv(&client, prefix, "EnableFilter"),
            filter_type: Signal::new(client.clone(), format!("{}FilterType", prefix))
                .with_kind(Kind::Config),
            num_filter: rbv(&client, prefix, "NumFilter"),
        }
    }
}

impl Component for ProcessPlugin {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.base.signals();
        entries.extend(signal_entries!(self;
            enable_background,
            enable_flat_field,
            enable_offset_scale,
            enable_filter,
            filter_type,
            num_filter,
        ));
        entries
    }

    fn address(&self) -> &str {
        self.base.prefix()
    }
}

/// Image rotation and flipping.
///
/// The Varex IOC exposes the transform selection as `Type`; other drivers
/// leave it out.
#[derive(Debug, Clone)]
pub struct TransformPlugin {
    pub base: PluginBase,
    pub transformation_type: Option<Signal>,
}

impl TransformPlugin {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        Self {
            base: PluginBase::new(client, prefix),
            transformation_type: None,
        }
    }

    /// Transform plugin with the `Type` control.
    pub fn with_type(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        Self {
            base: PluginBase::new(client.clone(), prefix),
            transformation_type: Some(
                Signal::new(client, format!("{}Type", prefix)).with_kind(Kind::Config),
            ),
        }
    }
}

impl Component for TransformPlugin {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.base.signals();
        if let Some(signal) = &self.transformation_type {
            entries.extend(nest("transformation_type", signal.signals()));
        }
        entries
    }

    fn address(&self) -> &str {
        self.base.prefix()
    }
}

/// Image preview plugin.
#[derive(Debug, Clone)]
pub struct ImagePlugin {
    pub base: PluginBase,
    pub array_data: SignalRo,
}

impl ImagePlugin {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str) -> Self {
        Self {
            base: PluginBase::new(client.clone(), prefix),
            array_data: SignalRo::new(client, format!("{}ArrayData", prefix))
                .with_kind(Kind::Omitted),
        }
    }
}

impl Component for ImagePlugin {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.base.signals();
        entries.extend(signal_entries!(self; array_data));
        entries
    }

    fn address(&self) -> &str {
        self.base.prefix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SoftIoc;
    use crate::signal::ReadSignal;

    fn client() -> Arc<dyn ChannelAccess> {
        Arc::new(SoftIoc::new())
    }

    #[test]
    fn test_hdf5_plugin_has_xml_file_name() {
        let hdf = Hdf5Plugin::new(client(), "1idPG4:HDF1:");
        let pvs: Vec<_> = hdf
            .signals()
            .iter()
            .map(|e| e.signal.pvname().to_string())
            .collect();

        assert!(pvs.contains(&"1idPG4:HDF1:XMLFileName_RBV".to_string()));
        assert!(pvs.contains(&"1idPG4:HDF1:FullFileName_RBV".to_string()));
        assert_eq!(hdf.address(), "1idPG4:HDF1:");
    }

    #[test]
    fn test_transform_type_is_optional() {
        let plain = TransformPlugin::new(client(), "1idPG4:Trans1:");
        let varex = TransformPlugin::with_type(client(), "6IDFF:Trans1:");

        assert_eq!(varex.signals().len(), plain.signals().len() + 1);
        let last = varex.signals().pop().map(|e| e.name);
        assert_eq!(last.as_deref(), Some("transformation_type"));
    }
}
