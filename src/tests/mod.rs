mod basic_assembly;
mod diagnostics;
mod range_checks;
mod registry_roundtrip;
