//! # Program Image model
//!
//! Read-only view over the directory-tree container produced by the
//! Vesper frontend. Every node is a [`Directory`]: a kind tag, a
//! human-readable identifier, an optional content lump (bytecode for
//! CODE, constant pool for DATA) and an ordered child list.
//!
//! Directories live in one arena owned by the [`ProgramImage`] and are
//! addressed by stable [`DirId`] handles. The handle doubles as the
//! image-wide dense index that bytecode `Call` instructions use as their
//! cross-reference key, so resolving a call target is a single array
//! lookup.
//!
//! The container's string kind tags are decoded once, at construction,
//! into the closed [`DirKind`] enum. The lowering pass never compares
//! kind strings.

pub mod segregate;

/// The finite set of directory kinds this backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirKind {
    /// The container root. Exactly one per image, always at index 0.
    Root,
    /// Root of one compiled project; user code hangs below it.
    Project,
    /// A module-local function definition.
    Func,
    /// An imported function descriptor.
    IFunc,
    /// A type declaration.
    Type,
    /// Top-level grouping directory for imported function descriptors.
    Import,
    /// One declared parameter of a function; wraps a TYPE child.
    Param,
    /// Declared return type of a function.
    Ret,
    /// Bytecode lump of a function.
    Code,
    /// Constant-data lump of a function.
    Data,
    /// The global (export) name of a function.
    Global,
}

impl DirKind {
    /// Decode a container kind tag. This is the only place the string
    /// form of a kind is inspected.
    pub fn from_tag(tag: &str) -> Option<DirKind> {
        match tag {
            "ROOT" => Some(DirKind::Root),
            "PROJECT" => Some(DirKind::Project),
            "FUNC" => Some(DirKind::Func),
            "IFUNC" => Some(DirKind::IFunc),
            "TYPE" => Some(DirKind::Type),
            "IMPORT" => Some(DirKind::Import),
            "PARAM" => Some(DirKind::Param),
            "RET" => Some(DirKind::Ret),
            "CODE" => Some(DirKind::Code),
            "DATA" => Some(DirKind::Data),
            "GLOBAL" => Some(DirKind::Global),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            DirKind::Root => "ROOT",
            DirKind::Project => "PROJECT",
            DirKind::Func => "FUNC",
            DirKind::IFunc => "IFUNC",
            DirKind::Type => "TYPE",
            DirKind::Import => "IMPORT",
            DirKind::Param => "PARAM",
            DirKind::Ret => "RET",
            DirKind::Code => "CODE",
            DirKind::Data => "DATA",
            DirKind::Global => "GLOBAL",
        }
    }
}

/// Stable handle into the image's directory arena.
///
/// The numeric value is also the image-wide dense index that `Call`
/// instructions encode as their target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirId(pub u32);

impl DirId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// One node of the Program Image tree.
#[derive(Debug, Clone)]
pub struct Directory {
    pub id: DirId,
    pub kind: DirKind,
    pub identifier: String,
    /// Raw content lump, if any (CODE bytecode, DATA constant pool).
    pub content: Option<Vec<u8>>,
    /// Ordered children, in declaration order.
    pub children: Vec<DirId>,
}

/// The whole compiled program image: an arena of directories plus the
/// handle of the container root.
///
/// Immutable once built; the lowering pass only reads it.
#[derive(Debug, Clone)]
pub struct ProgramImage {
    pub name: String,
    dirs: Vec<Directory>,
    root: DirId,
}

impl ProgramImage {
    pub fn root(&self) -> &Directory {
        // The builder always creates the root at slot 0
        &self.dirs[self.root.0 as usize]
    }

    pub fn directory(&self, id: DirId) -> &Directory {
        &self.dirs[id.0 as usize]
    }

    /// Resolve a raw 32-bit cross-reference from bytecode. Returns None
    /// when the index is outside the image's index space.
    pub fn resolve(&self, raw_index: u32) -> Option<&Directory> {
        self.dirs.get(raw_index as usize)
    }

    pub fn directory_count(&self) -> usize {
        self.dirs.len()
    }

    pub fn children_of(&self, dir: &Directory) -> impl Iterator<Item = &Directory> {
        dir.children.iter().map(|id| self.directory(*id))
    }

    /// First child of the given kind, if any.
    pub fn child_of_kind(&self, dir: &Directory, kind: DirKind) -> Option<&Directory> {
        self.children_of(dir).find(|c| c.kind == kind)
    }

    /// All children of the given kind, in declaration order.
    pub fn children_of_kind<'a>(
        &'a self,
        dir: &'a Directory,
        kind: DirKind,
    ) -> impl Iterator<Item = &'a Directory> {
        self.children_of(dir).filter(move |c| c.kind == kind)
    }
}

/// Construction surface for the container reader (and for tests).
///
/// Directories are appended in reading order, which is what gives every
/// node its dense image-wide index. `finish` freezes the image.
pub struct ImageBuilder {
    name: String,
    dirs: Vec<Directory>,
}

impl ImageBuilder {
    pub fn new(name: impl Into<String>) -> ImageBuilder {
        let name = name.into();
        // Slot 0 is the container root; the PROJECT directory for user
        // code and any IMPORT groups are added right below it.
        let dirs = vec![Directory {
            id: DirId(0),
            kind: DirKind::Root,
            identifier: name.clone(),
            content: None,
            children: Vec::new(),
        }];
        ImageBuilder { name, dirs }
    }

    /// Append a directory under `parent` and return its handle.
    pub fn add(&mut self, parent: DirId, kind: DirKind, identifier: impl Into<String>) -> DirId {
        self.add_with_content(parent, kind, identifier, None)
    }

    /// Append a directory carrying a content lump.
    pub fn add_lump(
        &mut self,
        parent: DirId,
        kind: DirKind,
        identifier: impl Into<String>,
        content: Vec<u8>,
    ) -> DirId {
        self.add_with_content(parent, kind, identifier, Some(content))
    }

    fn add_with_content(
        &mut self,
        parent: DirId,
        kind: DirKind,
        identifier: impl Into<String>,
        content: Option<Vec<u8>>,
    ) -> DirId {
        let id = DirId(self.dirs.len() as u32);
        self.dirs.push(Directory {
            id,
            kind,
            identifier: identifier.into(),
            content,
            children: Vec::new(),
        });
        self.dirs[parent.0 as usize].children.push(id);
        id
    }

    /// Handle of the container root.
    pub fn root(&self) -> DirId {
        DirId(0)
    }

    pub fn finish(self) -> ProgramImage {
        ProgramImage {
            name: self.name,
            dirs: self.dirs,
            root: DirId(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_round_trip() {
        for kind in [
            DirKind::Root,
            DirKind::Project,
            DirKind::Func,
            DirKind::IFunc,
            DirKind::Type,
            DirKind::Import,
            DirKind::Param,
            DirKind::Ret,
            DirKind::Code,
            DirKind::Data,
            DirKind::Global,
        ] {
            assert_eq!(DirKind::from_tag(kind.as_tag()), Some(kind));
        }
        assert_eq!(DirKind::from_tag("GARBAGE"), None);
        // Tags are case-sensitive
        assert_eq!(DirKind::from_tag("func"), None);
    }

    #[test]
    fn handles_are_dense_and_stable() {
        let mut builder = ImageBuilder::new("app");
        let root = builder.root();
        let project = builder.add(root, DirKind::Project, "app");
        let func = builder.add(project, DirKind::Func, "main");
        let image = builder.finish();

        assert_eq!(project.index(), 1);
        assert_eq!(func.index(), 2);
        assert_eq!(image.resolve(2).unwrap().identifier, "main");
        assert!(image.resolve(99).is_none());
    }

    #[test]
    fn child_lookups_respect_declaration_order() {
        let mut builder = ImageBuilder::new("app");
        let root = builder.root();
        let func = builder.add(root, DirKind::Func, "f");
        builder.add(func, DirKind::Param, "a");
        builder.add(func, DirKind::Param, "b");
        builder.add(func, DirKind::Ret, "Std.Types.Void");
        let image = builder.finish();

        let func = image.resolve(1).unwrap();
        let params: Vec<&str> = image
            .children_of_kind(func, DirKind::Param)
            .map(|p| p.identifier.as_str())
            .collect();
        assert_eq!(params, ["a", "b"]);
        assert!(image.child_of_kind(func, DirKind::Ret).is_some());
        assert!(image.child_of_kind(func, DirKind::Code).is_none());
    }
}
