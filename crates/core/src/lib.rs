pub mod config;

pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod embedding;
    pub mod frame;
    pub mod media_metadata;
    pub mod model_resolver;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod face_detector;
        pub mod face_embedder;
        pub mod face_engine;
    }
    pub mod infrastructure;
}

pub mod tracking {
    pub mod domain {
        pub mod track;
        pub mod tracker_engine;
    }
}

pub mod storage {
    pub mod domain {
        pub mod buffered_writer;
        pub mod store_record;
        pub mod vector_store;
    }
    pub mod infrastructure {
        pub mod flat_file_store;
    }
}

pub mod search {
    pub mod domain {
        pub mod search_normalizer;
        pub mod search_result;
    }
    pub mod search_service;
}

pub mod video {
    pub mod domain {
        pub mod media_reader;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod image_file_reader;
    }
}

pub mod pipeline {
    pub mod batch_ingest_use_case;
    pub mod pipeline_logger;
    pub mod process_image_use_case;
    pub mod process_video_use_case;
    pub mod run_report;
}
