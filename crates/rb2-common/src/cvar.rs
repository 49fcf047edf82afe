// cvar.rs — console variables (renderer and engine configuration)

use std::collections::HashMap;

use crate::common::{com_dprintf, com_printf};

pub const CVAR_ZERO: i32 = 0;
/// Saved to the config file.
pub const CVAR_ARCHIVE: i32 = 1;
/// Can only be set from the command line / code (`force_set`).
pub const CVAR_NOSET: i32 = 8;
/// Changes are deferred until `apply_latched` (next level / vid restart).
pub const CVAR_LATCH: i32 = 16;

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub default_string: String,
    pub latched_string: Option<String>,
    pub flags: i32,
    pub value: f32,
}

impl Cvar {
    /// Integer view of the value, as the renderer reads most of its switches.
    pub fn int_value(&self) -> i32 {
        self.value as i32
    }
}

/// The full cvar system context.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.find_var_index(name).map(|idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> usize {
        if let Some(idx) = self.find_var_index(name) {
            self.cvar_vars[idx].flags |= flags;
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            default_string: value.to_string(),
            latched_string: None,
            flags,
            value: parse_value(value),
        });
        self.cvar_index.insert(name.to_ascii_lowercase(), idx);
        idx
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> usize {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => return self.get(name, value, CVAR_ZERO),
        };
        let var = &mut self.cvar_vars[idx];

        if !force {
            if var.flags & CVAR_NOSET != 0 {
                com_printf(&format!("{} is write protected.\n", var.name));
                return idx;
            }

            if var.flags & CVAR_LATCH != 0 {
                let current = var.latched_string.as_deref().unwrap_or(&var.string);
                if value == current {
                    return idx;
                }
                com_printf(&format!("{} will be changed on the next level.\n", var.name));
                var.latched_string = Some(value.to_string());
                return idx;
            }
        } else {
            var.latched_string = None;
        }

        if value == var.string {
            return idx;
        }

        var.string = value.to_string();
        var.value = parse_value(value);
        com_dprintf(&format!("var = \"{}\"; value = \"{}\"\n", var.name, var.string));
        idx
    }

    /// Set a cvar value (respects NOSET and LATCH flags).
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, false)
    }

    /// Force-set a cvar value (ignores NOSET and LATCH).
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, true)
    }

    /// Set a cvar from a float value.
    pub fn set_value(&mut self, name: &str, value: f32) -> usize {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str)
    }

    /// Apply all latched variable changes.
    pub fn apply_latched(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.value = parse_value(&latched);
                var.string = latched;
            }
        }
    }
}
