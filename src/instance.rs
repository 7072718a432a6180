use crate::fragment::{Assembler, Fragment};
use crate::namespaces::XBRLI_NS;
use crate::validator::ValidationError;
use crate::xml::{Node, XmlDocument};

/// One parsed XML file and the XBRL fragments it holds.
#[derive(Debug)]
pub struct Document {
    location: Option<String>,
    fragments: Vec<Fragment>,
}

impl Document {
    /// Assembles a fragment for the root `xbrl` element, or for every `xbrl`
    /// element embedded in some other host document.
    pub fn assemble(xml: &XmlDocument, assembler: &Assembler, parallel: bool) -> Self {
        let mut roots = Vec::new();
        collect_xbrl_roots(&xml.root, &mut roots);
        let location = xml.location.as_deref();

        let fragments = if parallel && roots.len() > 1 {
            assemble_parallel(&roots, assembler, location)
        } else {
            roots
                .iter()
                .map(|root| assembler.assemble(root, location))
                .collect()
        };

        Self {
            location: xml.location.clone(),
            fragments,
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_valid(&self) -> bool {
        self.fragments.iter().all(|f| !f.has_errors())
    }

    pub fn validation_errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.fragments.iter().flat_map(|f| f.validation_errors())
    }

    pub fn fact_count(&self) -> usize {
        self.fragments.iter().map(|f| f.facts().len()).sum()
    }

    pub fn context_count(&self) -> usize {
        self.fragments.iter().map(|f| f.contexts().len()).sum()
    }

    pub fn unit_count(&self) -> usize {
        self.fragments.iter().map(|f| f.units().len()).sum()
    }

    pub fn schema_count(&self) -> usize {
        self.fragments.iter().map(|f| f.taxonomy().len()).sum()
    }
}

#[cfg(feature = "parallel")]
fn assemble_parallel(roots: &[&Node], assembler: &Assembler, location: Option<&str>) -> Vec<Fragment> {
    use rayon::prelude::*;
    roots
        .par_iter()
        .map(|root| assembler.assemble(root, location))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn assemble_parallel(roots: &[&Node], assembler: &Assembler, location: Option<&str>) -> Vec<Fragment> {
    roots
        .iter()
        .map(|root| assembler.assemble(root, location))
        .collect()
}

/// Outermost `xbrl` elements, in document order.
fn collect_xbrl_roots<'a>(node: &'a Node, out: &mut Vec<&'a Node>) {
    if node.is(XBRLI_NS, "xbrl") {
        out.push(node);
        return;
    }
    for child in node.children() {
        collect_xbrl_roots(child, out);
    }
}
