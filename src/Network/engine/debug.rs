use super::CoreEngine;
use std::fmt;

impl fmt::Debug for CoreEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::TableDebug::debug_core_engine(self, f)
    }
}
