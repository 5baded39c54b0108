//! Interception host that prints what a browser would be asked to do.

use mk_core::error::HostError;
use mk_core::{HookId, HookSpec, InterceptionHost};

#[derive(Debug, Default)]
pub struct PrintHost {
    pub installed: Vec<HookSpec>,
}

impl InterceptionHost for PrintHost {
    fn install(&mut self, spec: &HookSpec) -> Result<(), HostError> {
        let phase = spec.id.phase();
        println!(
            "  + {:<16} {:<20} types=[{}] urls=[{}] extra=[{}]",
            spec.id.name(),
            phase.event_name(),
            spec.types.host_names().join(","),
            spec.urls.join(", "),
            phase.extra_info().join(",")
        );
        self.installed.push(spec.clone());
        Ok(())
    }

    fn remove(&mut self, id: HookId) -> Result<(), HostError> {
        println!("  - {}", id.name());
        self.installed.retain(|spec| spec.id != id);
        Ok(())
    }
}
