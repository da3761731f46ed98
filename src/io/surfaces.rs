/// Surface codes found in CSV file names and the group each one is written to.
///
/// Both right ventricle codes land in the same group.
pub const SURFACE_GROUPS: [(&str, &str); 8] = [
    ("Epi", "epicardium"),
    ("LVendo", "endocardium of left ventricle"),
    ("RV_freewall", "endocardium of right ventricle"),
    ("RV_septum", "endocardium of right ventricle"),
    ("AV", "root of aorta"),
    ("MV", "root of mitral valve"),
    ("TV", "root of triscupid valve"),
    ("PV", "root of pulmonary valve"),
];

/// Returns the group name for a surface code, or `None` when the file does
/// not hold surface data.
pub fn resolve(code: &str) -> Option<&'static str> {
    SURFACE_GROUPS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}
