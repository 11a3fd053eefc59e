//! Document type catalogue.

/// A document type that every deployment ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentTypeSeed {
    pub name: &'static str,
    pub description: &'static str,
    pub requires_photo: bool,
    pub template_path: &'static str,
}

/// Name used for documents whose legacy type could not be resolved.
pub const FALLBACK_DOCUMENT_TYPE: &str = "Unknown";

pub const DEFAULT_DOCUMENT_TYPES: &[DocumentTypeSeed] = &[
    DocumentTypeSeed {
        name: "Barangay ID",
        description: "Identification card issued by the barangay.",
        requires_photo: true,
        template_path: "barangay_id",
    },
    DocumentTypeSeed {
        name: "Barangay Clearance",
        description: "General clearance certificate.",
        requires_photo: false,
        template_path: "barangay_clearance",
    },
    DocumentTypeSeed {
        name: "Business Clearance",
        description: "Clearance for business permit/renewal.",
        requires_photo: false,
        template_path: "business_clearance",
    },
    DocumentTypeSeed {
        name: "Certificate of Residency",
        description: "Certificate of residency.",
        requires_photo: false,
        template_path: "residency",
    },
    DocumentTypeSeed {
        name: "Certificate of Indigency",
        description: "Certificate of indigency.",
        requires_photo: false,
        template_path: "indigency",
    },
    DocumentTypeSeed {
        name: "Certificate of Good Moral",
        description: "Certificate of good moral character.",
        requires_photo: false,
        template_path: "good_moral",
    },
    DocumentTypeSeed {
        name: "Other Certificate",
        description: "Other barangay-issued certificate.",
        requires_photo: false,
        template_path: "other",
    },
];
