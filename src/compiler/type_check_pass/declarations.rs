use anyhow::Result;
use tracing::instrument;

use crate::prelude::*;

use super::TypeCheckWalker;

impl TypeCheckWalker<'_> {
    /// Only the body can go wrong; the signature was settled during name
    /// analysis.
    #[instrument(level = "trace", skip_all, fields(name = %f.name))]
    pub(super) fn function_declaration(&mut self, f: &FunctionDeclaration) -> Result<()> {
        let return_type = Type::from(&f.return_type);
        self.visit_block(&f.body, &return_type)
    }
}
